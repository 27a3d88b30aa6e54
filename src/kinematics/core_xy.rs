//! CoreXY belt kinematics.

use crate::config::{MotorConstraints, MotorMap};
use crate::{AXES, MOTORS};

use super::{Cartesian, Kinematics};

/// Motor A drives X + Y, motor B drives X - Y.
///
/// Motors on Z and the rotary axes keep a direct mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreXy {
    direct: Cartesian,
    a: Option<(usize, f32)>,
    b: Option<(usize, f32)>,
}

impl CoreXy {
    /// Build from motor constraints.
    pub fn new(motors: &[MotorConstraints]) -> Self {
        let find = |map: MotorMap| {
            motors
                .iter()
                .position(|m| m.map == map)
                .map(|i| (i, motors[i].steps_per_mm))
        };

        Self {
            direct: Cartesian::new(motors),
            a: find(MotorMap::CoreXyA),
            b: find(MotorMap::CoreXyB),
        }
    }
}

impl Kinematics for CoreXy {
    fn axes_to_motors(&self, axes: &[f32; AXES]) -> [f32; MOTORS] {
        let mut motors = self.direct.axes_to_motors(axes);
        let (x, y) = (axes[0], axes[1]);
        if let Some((i, spm)) = self.a {
            motors[i] = (x + y) * spm;
        }
        if let Some((i, spm)) = self.b {
            motors[i] = (x - y) * spm;
        }
        motors
    }

    fn motors_to_axes(&self, steps: &[i32; MOTORS]) -> [f32; AXES] {
        let mut axes = self.direct.motors_to_axes(steps);
        if let (Some((ia, sa)), Some((ib, sb))) = (self.a, self.b) {
            let a = steps[ia] as f32 / sa;
            let b = steps[ib] as f32 / sb;
            axes[0] = (a + b) * 0.5;
            axes[1] = (a - b) * 0.5;
        }
        axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axidraw() -> CoreXy {
        let motor = |map| MotorConstraints {
            map,
            steps_per_mm: 80.0,
            invert_direction: false,
        };
        CoreXy::new(&[motor(MotorMap::CoreXyA), motor(MotorMap::CoreXyB), motor(MotorMap::Z)])
    }

    #[test]
    fn test_pure_x_moves_both_belts_together() {
        let steps = axidraw().axes_to_steps(&[10.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(steps[0], 800);
        assert_eq!(steps[1], 800);
    }

    #[test]
    fn test_pure_y_moves_belts_opposite() {
        let steps = axidraw().axes_to_steps(&[0.0, 5.0, 2.0, 0.0, 0.0, 0.0]);
        assert_eq!(steps[0], 400);
        assert_eq!(steps[1], -400);
        assert_eq!(steps[2], 160);
    }

    #[test]
    fn test_forward_inverse_agree() {
        let k = axidraw();
        let target = [12.5, -7.25, 1.0, 0.0, 0.0, 0.0];
        let axes = k.motors_to_axes(&k.axes_to_steps(&target));
        for (got, want) in axes.iter().zip(target.iter()).take(3) {
            assert!((got - want).abs() < 1.0 / 80.0);
        }
    }
}
