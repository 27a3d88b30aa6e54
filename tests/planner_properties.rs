//! Property tests for lookahead planning.

use proptest::prelude::*;

use stepper_planner::config::{parse_config, MachineConstraints};
use stepper_planner::planner::{max_reachable, ramp_length, triangle_peak, Profile};
use stepper_planner::{Error, MachineState, MoveRequest, PlanError, Planner, SegmentQueue, AXES};

const CONFIG: &str = r#"
[planner]
cornering_tolerance_mm = 0.02

[axes.x]
max_velocity_mm_per_min = 6000.0
max_acceleration_mm_per_sec2 = 800.0
max_jerk_mm_per_sec3 = 8000.0

[axes.y]
max_velocity_mm_per_min = 4000.0
max_acceleration_mm_per_sec2 = 500.0
max_jerk_mm_per_sec3 = 5000.0

[axes.z]
max_velocity_mm_per_min = 600.0
max_acceleration_mm_per_sec2 = 100.0
max_jerk_mm_per_sec3 = 1000.0

[[motors]]
axis = "x"
travel_per_rev_mm = 8.0
microsteps = 8

[[motors]]
axis = "y"
travel_per_rev_mm = 8.0
microsteps = 8

[[motors]]
axis = "z"
travel_per_rev_mm = 2.0
microsteps = 4
"#;

const EPS: f32 = 1e-3;

fn constraints() -> MachineConstraints {
    let config = parse_config(CONFIG).expect("config should parse");
    MachineConstraints::from_config(&config).expect("config should validate")
}

fn request() -> impl Strategy<Value = MoveRequest> {
    (
        -50.0f32..50.0,
        -50.0f32..50.0,
        -5.0f32..5.0,
        30.0f32..6000.0,
        any::<bool>(),
    )
        .prop_map(|(x, y, z, feed, rapid)| {
            let target = [x, y, z, 0.0, 0.0, 0.0];
            if rapid {
                MoveRequest::traverse(target)
            } else {
                MoveRequest::feed(target, feed)
            }
        })
}

proptest! {
    #[test]
    fn planned_blocks_respect_limits(requests in prop::collection::vec(request(), 1..24)) {
        let state = MachineState::new();
        let mut queue = SegmentQueue::new();
        let (producer, _consumer) = queue.split();
        let mut planner = Planner::motion_only(constraints(), producer, &state);

        for request in requests {
            match planner.enqueue(request) {
                Ok(_) => {}
                Err(Error::Plan(PlanError::InvalidMove(_))) => {}
                Err(e) => return Err(TestCaseError::fail(format!("{:?}", e))),
            }
        }
        prop_assume!(planner.limit_clamps() == 0);

        let blocks: Vec<_> = planner.blocks().copied().collect();
        prop_assert_eq!(blocks.first().map(|b| b.entry_velocity), Some(0.0));
        prop_assert_eq!(blocks.last().map(|b| b.exit_velocity), Some(0.0));

        for pair in blocks.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            prop_assert!(next.entry_velocity <= next.junction_vmax + EPS);
            prop_assert!(next.entry_velocity <= prev.exit_velocity + EPS);
            prop_assert!((next.entry_velocity - prev.exit_velocity).abs() <= EPS);
        }

        for block in &blocks {
            let profile = block.profile();
            let sum = block.head_time + block.body_time + block.tail_time;
            prop_assert!((sum - profile.duration()).abs() <= 1e-4 * sum.max(1.0));
            prop_assert!((profile.length() - block.length).abs() <= EPS * block.length.max(1.0));
            prop_assert!(block.cruise_velocity <= block.cruise_vmax + EPS);
            prop_assert!(block.entry_velocity <= block.cruise_velocity + EPS);
            prop_assert!(block.exit_velocity <= block.cruise_velocity + EPS);
            prop_assert!((profile.velocity_at(0.0) - block.entry_velocity).abs() <= EPS);
            prop_assert!((profile.velocity_at(profile.duration()) - block.exit_velocity).abs() <= EPS);
        }
    }

    #[test]
    fn ramps_fit_their_distance(
        v0 in 0.0f32..100.0,
        length in 0.01f32..50.0,
        accel in 50.0f32..2000.0,
        jerk in 500.0f32..20000.0,
    ) {
        let v1 = max_reachable(v0, length, 1000.0, accel, jerk);
        prop_assert!(v1 >= v0);
        prop_assert!(ramp_length(v0, v1, accel, jerk) <= length * (1.0 + 1e-3) + 1e-4);
    }

    #[test]
    fn profile_velocity_is_continuous(
        v0 in 0.0f32..40.0,
        v1 in 0.0f32..40.0,
        cruise in 1.0f32..60.0,
        length in 0.5f32..40.0,
    ) {
        let (accel, jerk) = (500.0, 5000.0);
        prop_assume!(ramp_length(v0, v1, accel, jerk) <= length);
        let cruise = cruise.max(v0).max(v1);
        let peak = if ramp_length(v0, cruise, accel, jerk) + ramp_length(cruise, v1, accel, jerk) <= length {
            cruise
        } else {
            triangle_peak(v0, v1, length, cruise, accel, jerk)
        };
        let body = length - ramp_length(v0, peak, accel, jerk) - ramp_length(peak, v1, accel, jerk);
        let cruise_time = if peak > 0.0 { body.max(0.0) / peak } else { 0.0 };

        let profile: Profile = Profile::planned(v0, peak, v1, cruise_time, accel, jerk);
        let steps = 200;
        let dt = profile.duration() / steps as f32;
        let mut last = profile.velocity_at(0.0);
        for i in 1..=steps {
            let v = profile.velocity_at(i as f32 * dt);
            prop_assert!(v >= -EPS);
            prop_assert!(v <= peak + EPS);
            // |dv| bounded by accel * dt
            prop_assert!((v - last).abs() <= accel * dt + EPS);
            last = v;
        }
        prop_assert!((profile.length() - length).abs() <= EPS * length.max(1.0));
    }
}

#[test]
fn reversal_is_a_full_stop() {
    let state = MachineState::new();
    let mut queue = SegmentQueue::new();
    let (producer, _consumer) = queue.split();
    let mut planner = Planner::motion_only(constraints(), producer, &state);

    let mut target = [0.0; AXES];
    target[0] = 10.0;
    planner.enqueue(MoveRequest::feed(target, 3000.0)).unwrap();
    target[0] = 0.0;
    planner.enqueue(MoveRequest::feed(target, 3000.0)).unwrap();

    let blocks: Vec<_> = planner.blocks().copied().collect();
    assert_eq!(blocks[1].junction_vmax, 0.0);
    assert_eq!(blocks[0].exit_velocity, 0.0);
}
