//! Example: Simulated machine run.
//!
//! This example demonstrates how to:
//! - Load machine settings from TOML
//! - Queue moves, a dwell and synchronized coolant commands
//! - Drive the planner and the step generator as a planning loop and a
//!   timer interrupt would
//! - Pause with a feedhold and resume
//!
//! Run with: `cargo run --example simulate --features std [machine.toml]`

use core::cell::Cell;

use stepper_planner::{
    load_config, parse_config, CoolantState, HoldState, MachineConstraints, MachineState,
    MoveRequest, PinBank, Planner, SegmentQueue, StepGenerator,
};

const SAMPLE_CONFIG: &str = r#"
[planner]
cornering_tolerance_mm = 0.02
segment_time_us = 1000
tick_hz = 50000

[axes.x]
max_velocity_mm_per_min = 3000.0
max_feedrate_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 800.0
max_jerk_mm_per_sec3 = 8000.0

[axes.y]
max_velocity_mm_per_min = 3000.0
max_feedrate_mm_per_min = 1500.0
max_acceleration_mm_per_sec2 = 800.0
max_jerk_mm_per_sec3 = 8000.0

[[motors]]
axis = "x"
travel_per_rev_mm = 8.0
microsteps = 8

[[motors]]
axis = "y"
travel_per_rev_mm = 8.0
microsteps = 8
"#;

/// Mock STEP pin counting rising edges.
struct CountingPin<'a> {
    pulses: &'a Cell<u32>,
}

impl embedded_hal::digital::ErrorType for CountingPin<'_> {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for CountingPin<'_> {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.pulses.set(self.pulses.get() + 1);
        Ok(())
    }
}

/// Mock DIR pin.
struct MockDirPin;

impl embedded_hal::digital::ErrorType for MockDirPin {
    type Error = core::convert::Infallible;
}

impl embedded_hal::digital::OutputPin for MockDirPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

const TICKS_PER_POLL: u32 = 20;

fn main() -> stepper_planner::Result<()> {
    println!("=== Simulated Machine Run ===\n");

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(path)?,
        None => parse_config(SAMPLE_CONFIG)?,
    };
    let constraints = MachineConstraints::from_config(&config)?;
    let tick_hz = constraints.tick_hz as f32;
    println!(
        "{} motors, {} Hz ticks, {} ms segments",
        constraints.motors.len(),
        constraints.tick_hz,
        constraints.segment_time * 1000.0
    );

    // DIR polarity comes from each motor's `invert_direction`
    let pulses = [Cell::new(0), Cell::new(0)];
    let mut pins = PinBank::from_constraints(
        [
            (CountingPin { pulses: &pulses[0] }, MockDirPin),
            (CountingPin { pulses: &pulses[1] }, MockDirPin),
        ],
        &constraints.motors,
    )?;

    let state = MachineState::new();
    let mut queue = SegmentQueue::new();
    let (producer, consumer) = queue.split();
    let mut planner = Planner::motion_only(constraints, producer, &state);
    let mut generator = StepGenerator::new(consumer, &state);

    // A 20 mm square with a pause at the far corner
    let corners = [(20.0, 0.0), (20.0, 20.0), (0.0, 20.0), (0.0, 0.0)];
    planner.coolant(CoolantState {
        mist: false,
        flood: true,
    })?;
    for (i, &(x, y)) in corners.iter().enumerate() {
        planner.enqueue(MoveRequest::feed([x, y, 0.0, 0.0, 0.0, 0.0], 1200.0))?;
        if i == 1 {
            planner.dwell(0.25)?;
        }
    }
    planner.coolant(CoolantState::OFF)?;

    for (i, block) in planner.blocks().enumerate() {
        println!(
            "Block {}: {:?}, entry {:.2} mm/s, cruise {:.2} mm/s, exit {:.2} mm/s",
            i, block.kind, block.entry_velocity, block.cruise_velocity, block.exit_velocity
        );
    }

    let dt = TICKS_PER_POLL as f32 / tick_hz;
    let mut ticks: u64 = 0;
    let mut held_at = None;

    loop {
        planner.poll(dt)?;
        for _ in 0..TICKS_PER_POLL {
            generator.tick(&mut pins)?;
        }
        ticks += TICKS_PER_POLL as u64;

        // Hold somewhere along the first edge, then resume after 100 ms
        if ticks == 20_000 {
            planner.request_feedhold();
        }
        match (planner.hold_state(), held_at) {
            (HoldState::Held, None) => {
                held_at = Some(ticks);
                println!(
                    "\nHeld at {:?} mm after {:.3} s",
                    planner.machine_position().map(|p| [p[0], p[1]]),
                    ticks as f32 / tick_hz
                );
            }
            (HoldState::Held, Some(at)) if ticks >= at + 5_000 => {
                println!("Resuming");
                planner.request_resume();
            }
            _ => {}
        }

        if ticks % 50_000 == 0 {
            if let Some(snap) = state.snapshot() {
                println!(
                    "t = {:.1} s: {:?} at {:.2} mm/s, {} blocks queued",
                    ticks as f32 / tick_hz,
                    snap.phase,
                    snap.velocity,
                    snap.buffer_fill
                );
            }
        }

        if planner.is_idle() && planner.hold_state() == HoldState::Running {
            break;
        }
    }

    println!(
        "\nDone after {:.3} s: {} / {} steps, position {:?}",
        ticks as f32 / tick_hz,
        pulses[0].get(),
        pulses[1].get(),
        state.position()
    );
    Ok(())
}
