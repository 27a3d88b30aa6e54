//! Jerk-limited velocity profiles.
//!
//! Every profile is a short list of constant-jerk [`Piece`]s. A velocity
//! change between two speeds is an S-curve [`Ramp`]: jerk in, optional
//! constant acceleration, jerk out. Ramps start and end with zero
//! acceleration, so the velocity curve is point-symmetric about its middle
//! and its length is simply the mean speed times its duration.

use heapless::Vec;
use libm::{fabsf, sqrtf};

/// Current phase of motion execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MotionPhase {
    /// No motion.
    #[default]
    Idle = 0,
    /// Velocity increasing.
    Accelerating = 1,
    /// Constant cruise velocity.
    Cruising = 2,
    /// Velocity decreasing.
    Decelerating = 3,
    /// Timed pause at rest.
    Dwell = 4,
}

impl MotionPhase {
    /// Decode a value published through an atomic.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Accelerating,
            2 => Self::Cruising,
            3 => Self::Decelerating,
            4 => Self::Dwell,
            _ => Self::Idle,
        }
    }
}

const BISECT_ITERATIONS: usize = 32;

/// Shape of an S-curve velocity change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ramp {
    /// Start velocity.
    pub v0: f32,
    /// End velocity.
    pub v1: f32,
    /// Duration of each jerk piece.
    pub jerk_time: f32,
    /// Duration of the constant-acceleration piece.
    pub accel_time: f32,
    /// Peak acceleration magnitude.
    pub peak_accel: f32,
    /// Jerk magnitude.
    pub jerk: f32,
}

impl Ramp {
    /// Shortest ramp from `v0` to `v1` under an acceleration and jerk ceiling.
    pub fn new(v0: f32, v1: f32, accel: f32, jerk: f32) -> Self {
        let dv = fabsf(v1 - v0);
        let (jerk_time, accel_time, peak_accel) = if dv <= 0.0 || accel <= 0.0 || jerk <= 0.0 {
            (0.0, 0.0, 0.0)
        } else if dv * jerk <= accel * accel {
            // Acceleration never saturates
            let ap = sqrtf(dv * jerk);
            (ap / jerk, 0.0, ap)
        } else {
            let tj = accel / jerk;
            (tj, (dv / accel - tj).max(0.0), accel)
        };

        Self {
            v0,
            v1,
            jerk_time,
            accel_time,
            peak_accel,
            jerk,
        }
    }

    /// Ramp duration.
    #[inline]
    pub fn duration(&self) -> f32 {
        2.0 * self.jerk_time + self.accel_time
    }

    /// Distance covered by the ramp.
    #[inline]
    pub fn length(&self) -> f32 {
        0.5 * (self.v0 + self.v1) * self.duration()
    }

    fn push_pieces<const N: usize>(&self, phase: MotionPhase, profile: &mut Profile<N>) {
        let s = if self.v1 >= self.v0 { 1.0 } else { -1.0 };
        profile.push(phase, self.jerk_time, self.v0, 0.0, s * self.jerk);
        let (v, a) = profile.end_state(self.v0);
        profile.push(phase, self.accel_time, v, a, 0.0);
        let (v, a) = profile.end_state(self.v0);
        profile.push(phase, self.jerk_time, v, a, -s * self.jerk);
    }
}

/// Distance needed to change speed between `v0` and `v1`.
#[inline]
pub fn ramp_length(v0: f32, v1: f32, accel: f32, jerk: f32) -> f32 {
    Ramp::new(v0, v1, accel, jerk).length()
}

/// Highest speed reachable from `v_from` within `length`, capped at `cap`.
///
/// By symmetry this is also the highest speed from which `v_from` can be
/// reached within `length`.
pub fn max_reachable(v_from: f32, length: f32, cap: f32, accel: f32, jerk: f32) -> f32 {
    if cap <= v_from {
        return cap;
    }
    if ramp_length(v_from, cap, accel, jerk) <= length {
        return cap;
    }
    let (mut lo, mut hi) = (v_from, cap);
    for _ in 0..BISECT_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if ramp_length(v_from, mid, accel, jerk) <= length {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Lowest speed reachable by slowing from `v_from` within `length`.
pub fn min_reachable(v_from: f32, length: f32, accel: f32, jerk: f32) -> f32 {
    if ramp_length(0.0, v_from, accel, jerk) <= length {
        return 0.0;
    }
    let (mut lo, mut hi) = (0.0, v_from);
    for _ in 0..BISECT_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if ramp_length(mid, v_from, accel, jerk) <= length {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// Peak speed of a profile from `v0` to `v1` that covers exactly `length`
/// without a cruise, searched in `[max(v0, v1), cap]`.
pub fn triangle_peak(v0: f32, v1: f32, length: f32, cap: f32, accel: f32, jerk: f32) -> f32 {
    let total = |vp: f32| ramp_length(v0, vp, accel, jerk) + ramp_length(vp, v1, accel, jerk);
    let (mut lo, mut hi) = (v0.max(v1), cap);
    if total(hi) <= length {
        return hi;
    }
    for _ in 0..BISECT_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if total(mid) <= length {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// One constant-jerk stretch of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Piece {
    /// Phase reported while this piece runs.
    pub phase: MotionPhase,
    /// Piece duration.
    pub duration: f32,
    /// Time at which the piece starts within the profile.
    pub t0: f32,
    /// Distance at which the piece starts within the profile.
    pub s0: f32,
    /// Start velocity.
    pub v0: f32,
    /// Start acceleration.
    pub a0: f32,
    /// Jerk.
    pub jerk: f32,
}

impl Piece {
    /// Velocity `t` seconds into the piece.
    #[inline]
    pub fn velocity_at(&self, t: f32) -> f32 {
        self.v0 + self.a0 * t + 0.5 * self.jerk * t * t
    }

    /// Acceleration `t` seconds into the piece.
    #[inline]
    pub fn acceleration_at(&self, t: f32) -> f32 {
        self.a0 + self.jerk * t
    }

    /// Distance from the start of the piece after `t` seconds.
    #[inline]
    pub fn distance_at(&self, t: f32) -> f32 {
        t * (self.v0 + t * (0.5 * self.a0 + t * self.jerk / 6.0))
    }
}

/// A velocity profile built from constant-jerk pieces.
///
/// `N` bounds the piece count: a planned block needs seven (head ramp,
/// cruise, tail ramp), a hold needs four.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile<const N: usize = 8> {
    pieces: Vec<Piece, N>,
    duration: f32,
    length: f32,
}

impl<const N: usize> Profile<N> {
    /// An empty profile.
    pub const fn new() -> Self {
        Self {
            pieces: Vec::new(),
            duration: 0.0,
            length: 0.0,
        }
    }

    /// Head ramp, cruise, tail ramp.
    pub fn planned(
        entry: f32,
        cruise: f32,
        exit: f32,
        cruise_time: f32,
        accel: f32,
        jerk: f32,
    ) -> Self {
        let mut profile = Self::new();
        let head_phase = if cruise >= entry {
            MotionPhase::Accelerating
        } else {
            MotionPhase::Decelerating
        };
        Ramp::new(entry, cruise, accel, jerk).push_pieces(head_phase, &mut profile);
        let (v, _) = profile.end_state(entry);
        profile.push(MotionPhase::Cruising, cruise_time, v, 0.0, 0.0);
        let (v, _) = profile.end_state(entry);
        Ramp::new(v, exit, accel, jerk).push_pieces(MotionPhase::Decelerating, &mut profile);
        profile
    }

    /// Bring the state `(velocity, acceleration)` to rest.
    ///
    /// A positive acceleration is first driven to zero at full jerk, then an
    /// S-curve ramp takes the remaining speed to zero. A deceleration
    /// already under way is carried straight into the stop.
    pub fn stop_from(velocity: f32, acceleration: f32, accel: f32, jerk: f32) -> Self {
        let mut profile = Self::new();
        let mut v = velocity.max(0.0);
        if acceleration < 0.0 && accel > 0.0 && jerk > 0.0 {
            profile.continue_braking(v, acceleration, accel, jerk);
            return profile;
        }
        if acceleration > 0.0 && jerk > 0.0 {
            profile.push(MotionPhase::Accelerating, acceleration / jerk, v, acceleration, -jerk);
            v = profile.end_state(v).0.max(0.0);
        }
        Ramp::new(v, 0.0, accel, jerk).push_pieces(MotionPhase::Decelerating, &mut profile);
        profile
    }

    /// Stop from `v` while decelerating at `a < 0`: deepen the deceleration
    /// up to `accel`, hold it, and release it as the speed reaches zero.
    fn continue_braking(&mut self, v: f32, a: f32, accel: f32, jerk: f32) {
        let phase = MotionPhase::Decelerating;
        let (mut v, mut a) = (v, a);
        if -a > accel {
            self.push(phase, (-a - accel) / jerk, v, a, jerk);
            v = self.end_state(v).0.max(0.0);
            a = -accel;
        }

        // Speed lost while releasing the current deceleration
        let release = a * a / (2.0 * jerk);
        if v <= release {
            self.push(phase, -a / jerk, v, a, jerk);
            return;
        }

        let peak = sqrtf(jerk * v + 0.5 * a * a).min(accel);
        let hold = ((v - (2.0 * peak * peak - a * a) / (2.0 * jerk)) / peak).max(0.0);
        self.push(phase, (peak + a) / jerk, v, a, -jerk);
        let (v, _) = self.end_state(v);
        self.push(phase, hold, v, -peak, 0.0);
        let (v, _) = self.end_state(v);
        self.push(phase, peak / jerk, v, -peak, jerk);
    }

    fn push(&mut self, phase: MotionPhase, duration: f32, v0: f32, a0: f32, jerk: f32) {
        if !(duration > 0.0) {
            return;
        }
        let piece = Piece {
            phase,
            duration,
            t0: self.duration,
            s0: self.length,
            v0,
            a0,
            jerk,
        };
        if self.pieces.push(piece).is_ok() {
            self.duration += duration;
            self.length += piece.distance_at(duration);
        }
    }

    /// Velocity and acceleration at the end, or `(fallback, 0)` when empty.
    fn end_state(&self, fallback: f32) -> (f32, f32) {
        match self.pieces.last() {
            Some(p) => (p.velocity_at(p.duration), p.acceleration_at(p.duration)),
            None => (fallback, 0.0),
        }
    }

    /// Total duration.
    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Total distance.
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// The pieces in time order.
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    fn locate(&self, t: f32) -> Option<(&Piece, f32)> {
        let piece = self
            .pieces
            .iter()
            .find(|p| t < p.t0 + p.duration)
            .or_else(|| self.pieces.last())?;
        Some((piece, (t - piece.t0).clamp(0.0, piece.duration)))
    }

    /// Velocity at time `t`.
    pub fn velocity_at(&self, t: f32) -> f32 {
        self.locate(t).map(|(p, lt)| p.velocity_at(lt)).unwrap_or(0.0)
    }

    /// Acceleration at time `t`.
    pub fn acceleration_at(&self, t: f32) -> f32 {
        match self.locate(t) {
            Some((p, lt)) if t < self.duration => p.acceleration_at(lt),
            _ => 0.0,
        }
    }

    /// Distance travelled by time `t`.
    pub fn distance_at(&self, t: f32) -> f32 {
        self.locate(t)
            .map(|(p, lt)| p.s0 + p.distance_at(lt))
            .unwrap_or(0.0)
    }

    /// Phase at time `t`.
    pub fn phase_at(&self, t: f32) -> MotionPhase {
        match self.locate(t) {
            Some((p, _)) if t < self.duration => p.phase,
            _ => MotionPhase::Idle,
        }
    }

    /// Earliest time at which `distance` has been covered.
    pub fn time_at_distance(&self, distance: f32) -> f32 {
        if distance <= 0.0 {
            return 0.0;
        }
        if distance >= self.length {
            return self.duration;
        }
        let (mut lo, mut hi) = (0.0, self.duration);
        for _ in 0..BISECT_ITERATIONS {
            let mid = 0.5 * (lo + hi);
            if self.distance_at(mid) < distance {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: f32 = 500.0;
    const J: f32 = 5000.0;

    #[test]
    fn test_ramp_saturated_acceleration() {
        // a²/J = 50 mm/s, so a change of 80 mm/s saturates
        let r = Ramp::new(0.0, 80.0, A, J);
        assert!((r.peak_accel - A).abs() < 1e-3);
        assert!((r.jerk_time - 0.1).abs() < 1e-6);
        assert!((r.duration() - (80.0 / A + 0.1)).abs() < 1e-5);
    }

    #[test]
    fn test_ramp_unsaturated_acceleration() {
        let r = Ramp::new(0.0, 20.0, A, J);
        assert_eq!(r.accel_time, 0.0);
        assert!((r.peak_accel - sqrtf(20.0 * J)).abs() < 1e-2);
    }

    #[test]
    fn test_ramp_length_is_symmetric() {
        let up = ramp_length(5.0, 30.0, A, J);
        let down = ramp_length(30.0, 5.0, A, J);
        assert!((up - down).abs() < 1e-5);
    }

    #[test]
    fn test_profile_pieces_integrate_to_ramp_length() {
        let p: Profile = Profile::planned(0.0, 20.0, 0.0, 0.25, A, J);
        let head = ramp_length(0.0, 20.0, A, J);
        let expected = 2.0 * head + 20.0 * 0.25;
        assert!((p.length() - expected).abs() < 1e-3);
        assert!(p.velocity_at(p.duration()).abs() < 1e-3);
    }

    #[test]
    fn test_profile_velocity_continuous() {
        let p: Profile = Profile::planned(4.0, 25.0, 10.0, 0.1, A, J);
        for piece in p.pieces().windows(2) {
            let end = piece[0].velocity_at(piece[0].duration);
            assert!((end - piece[1].v0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_max_reachable_respects_length() {
        let v = max_reachable(0.0, 0.5, 100.0, A, J);
        assert!(v < 100.0);
        assert!(ramp_length(0.0, v, A, J) <= 0.5 + 1e-5);
        assert!(ramp_length(0.0, v * 1.01, A, J) > 0.5);
    }

    #[test]
    fn test_min_reachable() {
        assert_eq!(min_reachable(10.0, 100.0, A, J), 0.0);
        let v = min_reachable(40.0, 0.5, A, J);
        assert!(v > 0.0 && v < 40.0);
        assert!(ramp_length(v, 40.0, A, J) <= 0.5 + 1e-4);
    }

    #[test]
    fn test_stop_from_accelerating_state() {
        let p: Profile<4> = Profile::stop_from(10.0, 300.0, A, J);
        assert_eq!(p.pieces()[0].phase, MotionPhase::Accelerating);
        assert!(p.velocity_at(p.duration()).abs() < 1e-3);
        assert!(p.acceleration_at(0.0) > 0.0);
    }

    #[test]
    fn test_stop_from_decelerating_state_keeps_braking() {
        let v = 20.0;
        let a = -300.0;
        let p: Profile<4> = Profile::stop_from(v, a, A, J);

        assert!(p.pieces().iter().all(|piece| piece.phase == MotionPhase::Decelerating));
        assert!((p.acceleration_at(0.0) - a).abs() < 1e-3);
        assert!(p.velocity_at(p.duration()).abs() < 1e-3);
        assert!(p.acceleration_at(p.duration()).abs() < 1e-2);
        for piece in p.pieces().windows(2) {
            let end = piece[0].velocity_at(piece[0].duration);
            assert!((end - piece[1].v0).abs() < 1e-4);
        }

        // Releasing the deceleration first and ramping down again takes longer
        let released = v - a * a / (2.0 * J);
        let two_step = -a / J + Ramp::new(released, 0.0, A, J).duration();
        assert!(p.duration() < two_step - 0.01);
    }

    #[test]
    fn test_stop_from_hard_braking_saturates() {
        let p: Profile<4> = Profile::stop_from(120.0, -200.0, A, J);
        let peak = p
            .pieces()
            .iter()
            .map(|piece| -piece.a0)
            .fold(0.0, f32::max);
        assert!((peak - A).abs() < 1e-2);
        assert!(p.velocity_at(p.duration()).abs() < 1e-2);

        // Deceleration beyond the ceiling is shed first
        let p: Profile<4> = Profile::stop_from(120.0, -800.0, A, J);
        assert!(p.acceleration_at(p.pieces()[0].duration) >= -A - 1e-2);
        assert!(p.velocity_at(p.duration()).abs() < 1e-2);
    }

    #[test]
    fn test_time_at_distance_inverts_distance() {
        let p: Profile = Profile::planned(0.0, 20.0, 0.0, 0.2, A, J);
        let t = p.time_at_distance(3.0);
        assert!((p.distance_at(t) - 3.0).abs() < 1e-3);
    }
}
