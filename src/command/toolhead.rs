//! Spindle toolhead devices.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::config::SpindleConfig;
use crate::error::MotorError;

const OVERRIDE_MIN: f32 = 0.05;
const OVERRIDE_MAX: f32 = 2.0;

/// Spindle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpindleDirection {
    /// Stopped.
    #[default]
    Off,
    /// Clockwise (M3).
    Cw,
    /// Counter-clockwise (M4).
    Ccw,
}

/// Speed and direction applied together when a synchronized command fires.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ToolheadState {
    /// Requested speed in RPM.
    pub speed: f32,
    /// Requested rotation.
    pub direction: SpindleDirection,
}

/// A spindle or other tool-head device.
///
/// `set_speed` and `set_direction` record a request and return true when
/// it changes the tool state, in which case the planner queues an
/// [`engage`](Toolhead::engage) in order with motion. Returning false means
/// nothing needs to happen.
pub trait Toolhead {
    /// Record a speed request in RPM.
    fn set_speed(&mut self, speed: f32) -> bool;

    /// Last requested speed.
    fn get_speed(&self) -> f32;

    /// Record a direction request.
    fn set_direction(&mut self, direction: SpindleDirection) -> bool;

    /// Last requested direction.
    fn get_direction(&self) -> SpindleDirection;

    /// Drive the outputs to `state`.
    fn engage(&mut self, state: &ToolheadState) -> Result<(), MotorError>;

    /// Turn the tool off. The requested state is left alone.
    fn stop(&mut self) -> Result<(), MotorError>;

    /// Stop for a feedhold, keeping the engaged state.
    fn pause(&mut self) -> Result<(), MotorError>;

    /// Restore the state saved by [`pause`](Toolhead::pause).
    fn resume(&mut self) -> Result<(), MotorError>;

    /// Whether motion may restart after a resume.
    fn ready_to_resume(&self) -> bool;

    /// Whether the tool is running or paused while running.
    fn is_on(&self) -> bool;

    /// Whether the tool is still settling (spinning up).
    fn busy(&self) -> bool;

    /// Return to the power-on state.
    fn reset(&mut self) -> Result<(), MotorError>;

    /// Let `dt` seconds of time pass.
    fn advance(&mut self, dt: f32) -> Result<(), MotorError>;

    /// Set the speed override factor. Zero turns the override off.
    fn set_override(&mut self, factor: f32) -> Result<(), MotorError>;
}

/// A toolhead that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToolhead;

impl Toolhead for NullToolhead {
    fn set_speed(&mut self, _speed: f32) -> bool {
        false
    }

    fn get_speed(&self) -> f32 {
        0.0
    }

    fn set_direction(&mut self, _direction: SpindleDirection) -> bool {
        false
    }

    fn get_direction(&self) -> SpindleDirection {
        SpindleDirection::Off
    }

    fn engage(&mut self, _state: &ToolheadState) -> Result<(), MotorError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MotorError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MotorError> {
        Ok(())
    }

    fn ready_to_resume(&self) -> bool {
        true
    }

    fn is_on(&self) -> bool {
        false
    }

    fn busy(&self) -> bool {
        false
    }

    fn reset(&mut self) -> Result<(), MotorError> {
        Ok(())
    }

    fn advance(&mut self, _dt: f32) -> Result<(), MotorError> {
        Ok(())
    }

    fn set_override(&mut self, _factor: f32) -> Result<(), MotorError> {
        Ok(())
    }
}

/// Linear ramp of the override factor.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OverrideRamp {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl OverrideRamp {
    fn settled(factor: f32) -> Self {
        Self {
            from: factor,
            to: factor,
            elapsed: 0.0,
            duration: 0.0,
        }
    }

    fn current(&self) -> f32 {
        if self.duration <= 0.0 || self.elapsed >= self.duration {
            self.to
        } else {
            self.from + (self.to - self.from) * (self.elapsed / self.duration)
        }
    }

    fn is_settled(&self) -> bool {
        self.current() == self.to
    }
}

/// PWM spindle with enable and direction pins.
///
/// Speed maps linearly from `speed_min` (zero duty) to `speed_max` (full
/// duty), scaled by the override factor.
pub struct PinSpindle<EN, DIR, PWM>
where
    EN: OutputPin,
    DIR: OutputPin,
    PWM: SetDutyCycle,
{
    enable: EN,
    dir: DIR,
    pwm: PWM,
    config: SpindleConfig,
    requested: ToolheadState,
    engaged: ToolheadState,
    paused: bool,
    spinup_remaining: f32,
    ramp: OverrideRamp,
}

impl<EN, DIR, PWM> PinSpindle<EN, DIR, PWM>
where
    EN: OutputPin,
    DIR: OutputPin,
    PWM: SetDutyCycle,
{
    /// Wrap spindle pins. Outputs are not touched until the first command.
    pub fn new(enable: EN, dir: DIR, pwm: PWM, config: SpindleConfig) -> Self {
        Self {
            enable,
            dir,
            pwm,
            config,
            requested: ToolheadState::default(),
            engaged: ToolheadState::default(),
            paused: false,
            spinup_remaining: 0.0,
            ramp: OverrideRamp::settled(1.0),
        }
    }

    /// Release the pins.
    pub fn release(self) -> (EN, DIR, PWM) {
        (self.enable, self.dir, self.pwm)
    }

    /// Current override factor.
    pub fn override_factor(&self) -> f32 {
        self.ramp.current()
    }

    /// Speed the outputs are driving, after override.
    pub fn output_speed(&self) -> f32 {
        if self.paused || self.engaged.direction == SpindleDirection::Off {
            0.0
        } else {
            self.engaged.speed * self.ramp.current()
        }
    }

    fn duty_for(&self, speed: f32) -> u16 {
        let max = self.pwm.max_duty_cycle();
        let span = self.config.speed_max - self.config.speed_min;
        if speed <= 0.0 || span <= 0.0 {
            return 0;
        }
        let fraction = ((speed - self.config.speed_min) / span).clamp(0.0, 1.0);
        libm::roundf(fraction * f32::from(max)) as u16
    }

    fn set_enable(&mut self, on: bool) -> Result<(), MotorError> {
        let high = on == self.config.enable_active_high;
        if high {
            self.enable.set_high().map_err(|_| MotorError::PinError)
        } else {
            self.enable.set_low().map_err(|_| MotorError::PinError)
        }
    }

    fn write_outputs(&mut self) -> Result<(), MotorError> {
        let on = self.output_speed() > 0.0;
        match self.engaged.direction {
            SpindleDirection::Off => {}
            SpindleDirection::Cw | SpindleDirection::Ccw => {
                let high = (self.engaged.direction == SpindleDirection::Cw)
                    == self.config.cw_direction_high;
                if high {
                    self.dir.set_high().map_err(|_| MotorError::PinError)?;
                } else {
                    self.dir.set_low().map_err(|_| MotorError::PinError)?;
                }
            }
        }
        let duty = if on { self.duty_for(self.output_speed()) } else { 0 };
        self.pwm.set_duty_cycle(duty).map_err(|_| MotorError::PinError)?;
        self.set_enable(on)
    }
}

impl<EN, DIR, PWM> Toolhead for PinSpindle<EN, DIR, PWM>
where
    EN: OutputPin,
    DIR: OutputPin,
    PWM: SetDutyCycle,
{
    fn set_speed(&mut self, speed: f32) -> bool {
        let speed = speed.max(0.0);
        let changed = speed != self.requested.speed;
        self.requested.speed = speed;
        changed
    }

    fn get_speed(&self) -> f32 {
        self.requested.speed
    }

    fn set_direction(&mut self, direction: SpindleDirection) -> bool {
        let changed = direction != self.requested.direction;
        self.requested.direction = direction;
        changed
    }

    fn get_direction(&self) -> SpindleDirection {
        self.requested.direction
    }

    fn engage(&mut self, state: &ToolheadState) -> Result<(), MotorError> {
        let was_on = self.output_speed() > 0.0;
        self.engaged = *state;
        if !was_on && self.output_speed() > 0.0 {
            self.spinup_remaining = self.config.spinup_delay;
        }
        self.write_outputs()
    }

    fn stop(&mut self) -> Result<(), MotorError> {
        // Requests queued behind this stop keep their direction
        self.engaged.direction = SpindleDirection::Off;
        self.paused = false;
        self.spinup_remaining = 0.0;
        self.write_outputs()
    }

    fn pause(&mut self) -> Result<(), MotorError> {
        if !self.config.pause_on_hold || self.paused {
            return Ok(());
        }
        self.paused = true;
        self.write_outputs()
    }

    fn resume(&mut self) -> Result<(), MotorError> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        if self.output_speed() > 0.0 {
            self.spinup_remaining = self.config.spinup_delay;
        }
        self.write_outputs()
    }

    fn ready_to_resume(&self) -> bool {
        !self.paused && self.spinup_remaining <= 0.0
    }

    fn is_on(&self) -> bool {
        self.engaged.direction != SpindleDirection::Off && self.engaged.speed > 0.0
    }

    fn busy(&self) -> bool {
        self.spinup_remaining > 0.0 || !self.ramp.is_settled()
    }

    fn reset(&mut self) -> Result<(), MotorError> {
        self.requested = ToolheadState::default();
        self.engaged = ToolheadState::default();
        self.paused = false;
        self.spinup_remaining = 0.0;
        self.ramp = OverrideRamp::settled(1.0);
        self.write_outputs()
    }

    fn advance(&mut self, dt: f32) -> Result<(), MotorError> {
        if dt <= 0.0 {
            return Ok(());
        }
        self.spinup_remaining = (self.spinup_remaining - dt).max(0.0);
        if !self.ramp.is_settled() {
            self.ramp.elapsed += dt;
            if self.output_speed() > 0.0 {
                return self.write_outputs();
            }
        }
        Ok(())
    }

    fn set_override(&mut self, factor: f32) -> Result<(), MotorError> {
        let target = if factor == 0.0 {
            1.0
        } else {
            factor.clamp(OVERRIDE_MIN, OVERRIDE_MAX)
        };
        self.ramp = OverrideRamp {
            from: self.ramp.current(),
            to: target,
            elapsed: 0.0,
            duration: self.config.override_ramp,
        };
        if self.ramp.duration <= 0.0 && self.output_speed() > 0.0 {
            return self.write_outputs();
        }
        Ok(())
    }
}
