use serde::{Deserialize, Serialize};

/// Raw tri-axial motion sample as delivered by the sensor source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Device pose estimate in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl Orientation {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }
}

/// Estimate pitch/roll/yaw from a single sample.
///
/// No filtering: every sample stands on its own. The zero vector maps to
/// `{0, 0, 0}` because `atan2(0, 0)` is zero.
pub fn calculate_orientation(sample: MotionSample) -> Orientation {
    let MotionSample { x, y, z } = sample;
    let pitch = (-x).atan2((y * y + z * z).sqrt()).to_degrees();
    let roll = y.atan2(z).to_degrees();
    let yaw = x.atan2(y).to_degrees();

    Orientation { pitch, roll, yaw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_device_is_level() {
        let orientation = calculate_orientation(MotionSample::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(orientation.pitch, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orientation.roll, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orientation.yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_vector_does_not_blow_up() {
        let orientation = calculate_orientation(MotionSample::default());
        assert_eq!(orientation, Orientation::default());
    }

    #[test]
    fn gravity_along_negative_x_pitches_up() {
        let orientation = calculate_orientation(MotionSample::new(-1.0, 0.0, 0.0));
        assert_abs_diff_eq!(orientation.pitch, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(orientation.yaw, -90.0, epsilon = 1e-9);
    }

    #[test]
    fn upside_down_rolls_to_180() {
        let orientation = calculate_orientation(MotionSample::new(0.0, 0.0, -1.0));
        assert_abs_diff_eq!(orientation.roll.abs(), 180.0, epsilon = 1e-9);
    }

    #[test]
    fn equal_x_and_y_gives_45_yaw() {
        let orientation = calculate_orientation(MotionSample::new(0.3, 0.3, 0.9));
        assert_abs_diff_eq!(orientation.yaw, 45.0, epsilon = 1e-9);
    }

    #[test]
    fn estimate_is_deterministic() {
        let sample = MotionSample::new(0.12, -0.4, 0.88);
        assert_eq!(calculate_orientation(sample), calculate_orientation(sample));
    }
}
