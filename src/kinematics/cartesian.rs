//! Direct motor-to-axis mapping.

use crate::config::MotorConstraints;
use crate::{AXES, MOTORS};

/// Each motor follows one axis.
///
/// Several motors may be mapped to the same axis (dual-motor gantry). For
/// the reverse transform the first motor on an axis is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub struct Cartesian {
    axis_of: [Option<usize>; MOTORS],
    steps_per_mm: [f32; MOTORS],
}

impl Cartesian {
    /// Build from motor constraints.
    pub fn new(motors: &[MotorConstraints]) -> Self {
        let mut axis_of = [None; MOTORS];
        let mut steps_per_mm = [0.0; MOTORS];

        for (i, motor) in motors.iter().enumerate().take(MOTORS) {
            axis_of[i] = motor.map.direct_axis().map(|a| a.index());
            steps_per_mm[i] = motor.steps_per_mm;
        }

        Self { axis_of, steps_per_mm }
    }
}

impl super::Kinematics for Cartesian {
    fn axes_to_motors(&self, axes: &[f32; AXES]) -> [f32; MOTORS] {
        let mut motors = [0.0; MOTORS];
        for (m, out) in motors.iter_mut().enumerate() {
            if let Some(axis) = self.axis_of[m] {
                *out = axes[axis] * self.steps_per_mm[m];
            }
        }
        motors
    }

    fn motors_to_axes(&self, steps: &[i32; MOTORS]) -> [f32; AXES] {
        let mut axes = [0.0; AXES];
        let mut seen = [false; AXES];
        for m in 0..MOTORS {
            if let Some(axis) = self.axis_of[m] {
                if !seen[axis] {
                    axes[axis] = steps[m] as f32 / self.steps_per_mm[m];
                    seen[axis] = true;
                }
            }
        }
        axes
    }
}
