//! Cornering speed between consecutive moves.

use libm::sqrtf;

use crate::AXES;

const STRAIGHT_COS: f32 = 0.999_999;

/// Maximum speed through the junction of two moves.
///
/// Uses the junction deviation model: the corner is treated as an arc
/// tangent to both moves whose closest approach to the corner point is
/// `tolerance`, and speed is limited to keep centripetal acceleration
/// within `accel`:
///
/// `v² = accel · tolerance · sin(θ/2) / (1 − sin(θ/2))`
///
/// where θ is the angle between the reversed incoming direction and the
/// outgoing direction. Collinear moves return infinity (bounded elsewhere
/// by the cruise ceilings) and a full reversal returns zero.
pub fn junction_velocity(prev: &[f32; AXES], next: &[f32; AXES], accel: f32, tolerance: f32) -> f32 {
    let dot: f32 = prev.iter().zip(next.iter()).map(|(a, b)| a * b).sum();
    let cos_theta = -dot;

    if cos_theta <= -STRAIGHT_COS {
        return f32::INFINITY;
    }
    if cos_theta >= STRAIGHT_COS {
        return 0.0;
    }

    let sin_half = sqrtf(0.5 * (1.0 - cos_theta));
    sqrtf(accel * tolerance * sin_half / (1.0 - sin_half))
}

#[cfg(test)]
mod tests {
    use super::*;

    const X: [f32; AXES] = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
    const Y: [f32; AXES] = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
    const NEG_X: [f32; AXES] = [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0];

    #[test]
    fn test_collinear_is_unbounded() {
        assert!(junction_velocity(&X, &X, 500.0, 0.01).is_infinite());
    }

    #[test]
    fn test_reversal_stops() {
        assert_eq!(junction_velocity(&X, &NEG_X, 500.0, 0.01), 0.0);
    }

    #[test]
    fn test_right_angle() {
        let v = junction_velocity(&X, &Y, 500.0, 0.01);
        let s = core::f32::consts::FRAC_1_SQRT_2;
        let expected = sqrtf(500.0 * 0.01 * s / (1.0 - s));
        assert!((v - expected).abs() < 1e-4);
    }

    #[test]
    fn test_sharper_corner_is_slower() {
        let h = core::f32::consts::FRAC_1_SQRT_2;
        let shallow = [h, h, 0.0, 0.0, 0.0, 0.0];
        let sharp = [-h, h, 0.0, 0.0, 0.0, 0.0];
        assert!(
            junction_velocity(&X, &shallow, 500.0, 0.01) > junction_velocity(&X, &sharp, 500.0, 0.01)
        );
    }
}
