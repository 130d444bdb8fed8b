// Unit conversions from planner units to RoboClaw native values
//
// Pure functions; the controller applies them after validating the motor.

use super::error::{MotorError, Result};
use super::params::Hardstop;

/// Drive level meaning "stop" for ForwardBackward commands
pub const POWER_STOP_LEVEL: i32 = 64;

/// Ticks from stop to full forward. Reverse has one more tick (64 -> 0),
/// the range is asymmetric on the controller itself.
const POWER_FORWARD_SPAN: i32 = 63;

/// Percent bound for power and velocity commands
pub const MAX_PERCENT: f64 = 100.0;

/// Percent power -> ForwardBackward drive level
///
/// 100 is full forward, -100 is full reverse, 0 cuts power.
pub fn power_level(percentage: i32) -> Result<u8> {
    let limit = MAX_PERCENT as i32;
    if !(-limit..=limit).contains(&percentage) {
        return Err(MotorError::out_of_range(
            "Motor power percentage",
            percentage as f64,
            MAX_PERCENT,
        ));
    }

    let level = (POWER_STOP_LEVEL as f64 + percentage as f64 * POWER_FORWARD_SPAN as f64 / 100.0)
        .round() as i32;

    Ok(level.clamp(1, 127) as u8)
}

/// Percent of max velocity -> signed QPPS
pub fn velocity_qpps(pct_velocity: f64, max_velocity: u32, inverted: bool) -> Result<i32> {
    // NaN fails this comparison and is rejected too
    if !(pct_velocity.abs() <= MAX_PERCENT) {
        return Err(MotorError::out_of_range(
            "Velocity percentage",
            pct_velocity,
            MAX_PERCENT,
        ));
    }

    let qpps = (max_velocity as f64 * pct_velocity / 100.0).round() as i32;

    Ok(if inverted { -qpps } else { qpps })
}

/// Degrees off center (positive clockwise) -> encoder position
pub fn angle_position(degrees: f64, hardstop: &Hardstop, inverted: bool) -> Result<i32> {
    if !(degrees.abs() <= hardstop.angle) {
        return Err(MotorError::out_of_range(
            "Steering angle",
            degrees,
            hardstop.angle,
        ));
    }

    let position = (hardstop.count as f64 * degrees / hardstop.angle).round() as i32;

    Ok(if inverted { -position } else { position })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDSTOP: Hardstop = Hardstop {
        count: 1600,
        angle: 45.0,
    };

    #[test]
    fn test_power_endpoints() {
        assert_eq!(power_level(0).unwrap(), 64);
        assert_eq!(power_level(100).unwrap(), 127);
        assert_eq!(power_level(-100).unwrap(), 1);
    }

    #[test]
    fn test_power_matches_affine_map_everywhere() {
        for p in -100..=100 {
            let expected = (64.0 + 63.0 * p as f64 / 100.0).round() as i32;
            let level = power_level(p).unwrap() as i32;
            assert_eq!(level, expected.clamp(1, 127), "percentage {}", p);
            assert!((1..=127).contains(&level));
        }
    }

    #[test]
    fn test_power_rounds_half_away_from_zero() {
        // 64 + 63*50/100 = 95.5
        assert_eq!(power_level(50).unwrap(), 96);
        // 64 - 31.5 = 32.5
        assert_eq!(power_level(-50).unwrap(), 33);
    }

    #[test]
    fn test_power_out_of_range() {
        assert!(matches!(
            power_level(101),
            Err(MotorError::OutOfRange { .. })
        ));
        assert!(power_level(-101).is_err());
    }

    #[test]
    fn test_power_extreme_integers_rejected() {
        assert!(matches!(
            power_level(i32::MIN),
            Err(MotorError::OutOfRange { .. })
        ));
        assert!(matches!(
            power_level(i32::MAX),
            Err(MotorError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_velocity_scaling_and_inversion() {
        assert_eq!(velocity_qpps(50.0, 3000, false).unwrap(), 1500);
        assert_eq!(velocity_qpps(50.0, 3000, true).unwrap(), -1500);
        assert_eq!(velocity_qpps(-100.0, 3000, false).unwrap(), -3000);
        assert_eq!(velocity_qpps(0.0, 3000, true).unwrap(), 0);
        // 1234 * 0.333 = 410.922
        assert_eq!(velocity_qpps(33.3, 1234, false).unwrap(), 411);
    }

    #[test]
    fn test_velocity_sign_flip_for_all_percentages() {
        for v in -100..=100 {
            let straight = velocity_qpps(v as f64, 2777, false).unwrap();
            let inverted = velocity_qpps(v as f64, 2777, true).unwrap();
            assert_eq!(straight, -inverted);
            assert_eq!(straight, (2777.0 * v as f64 / 100.0).round() as i32);
        }
    }

    #[test]
    fn test_velocity_out_of_range() {
        assert!(matches!(
            velocity_qpps(150.0, 3000, false),
            Err(MotorError::OutOfRange { .. })
        ));
        assert!(velocity_qpps(-100.5, 3000, false).is_err());
        assert!(velocity_qpps(f64::NAN, 3000, false).is_err());
    }

    #[test]
    fn test_angle_linear_map() {
        assert_eq!(angle_position(0.0, &HARDSTOP, false).unwrap(), 0);
        assert_eq!(angle_position(45.0, &HARDSTOP, false).unwrap(), 1600);
        assert_eq!(angle_position(-45.0, &HARDSTOP, false).unwrap(), -1600);
        assert_eq!(angle_position(22.5, &HARDSTOP, false).unwrap(), 800);
        assert_eq!(angle_position(22.5, &HARDSTOP, true).unwrap(), -800);
        // 1600 * 10 / 45 = 355.55...
        assert_eq!(angle_position(10.0, &HARDSTOP, false).unwrap(), 356);
    }

    #[test]
    fn test_angle_beyond_hardstop() {
        assert!(matches!(
            angle_position(46.0, &HARDSTOP, false),
            Err(MotorError::OutOfRange { .. })
        ));
        assert!(angle_position(-45.01, &HARDSTOP, true).is_err());
    }
}
