//! Mapping between Cartesian axis space and motor space.
//!
//! Kinematics are pure functions of configuration. The runtime converts
//! every segment end point to absolute motor steps with
//! [`Kinematics::axes_to_motors`]; telemetry and fault recovery go the
//! other way with [`Kinematics::motors_to_axes`].

mod cartesian;
mod core_xy;

pub use cartesian::Cartesian;
pub use core_xy::CoreXy;

use crate::config::{KinematicsKind, MachineConstraints};
use crate::{AXES, MOTORS};

/// Axis-space to motor-space transform.
pub trait Kinematics {
    /// Absolute motor positions in (fractional) steps for an axis position in mm.
    fn axes_to_motors(&self, axes: &[f32; AXES]) -> [f32; MOTORS];

    /// Axis position in mm for absolute motor step counts.
    fn motors_to_axes(&self, steps: &[i32; MOTORS]) -> [f32; AXES];

    /// Rounded absolute motor positions for an axis position.
    fn axes_to_steps(&self, axes: &[f32; AXES]) -> [i32; MOTORS] {
        let motors = self.axes_to_motors(axes);
        let mut steps = [0i32; MOTORS];
        for (s, m) in steps.iter_mut().zip(motors.iter()) {
            *s = libm::roundf(*m) as i32;
        }
        steps
    }
}

/// Kinematics selected at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub enum MachineKinematics {
    /// Direct motor/axis mapping.
    Cartesian(Cartesian),
    /// Belt-coupled X/Y.
    CoreXy(CoreXy),
}

impl MachineKinematics {
    /// Build the kinematics named by the constraints.
    pub fn from_constraints(constraints: &MachineConstraints) -> Self {
        match constraints.kinematics {
            KinematicsKind::Cartesian => Self::Cartesian(Cartesian::new(&constraints.motors)),
            KinematicsKind::CoreXy => Self::CoreXy(CoreXy::new(&constraints.motors)),
        }
    }
}

impl Kinematics for MachineKinematics {
    fn axes_to_motors(&self, axes: &[f32; AXES]) -> [f32; MOTORS] {
        match self {
            Self::Cartesian(k) => k.axes_to_motors(axes),
            Self::CoreXy(k) => k.axes_to_motors(axes),
        }
    }

    fn motors_to_axes(&self, steps: &[i32; MOTORS]) -> [f32; AXES] {
        match self {
            Self::Cartesian(k) => k.motors_to_axes(steps),
            Self::CoreXy(k) => k.motors_to_axes(steps),
        }
    }
}
