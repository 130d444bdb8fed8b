//! RoboClaw connection and calibration parameters.
//!
//! Loaded once from a JSON document with three sections:
//!
//! ```json
//! {
//!   "connect":  { "port": "/dev/ttyACM0", "baudrate": 115200, "timeout": 0.01, "retries": 3 },
//!   "velocity": { "maxCurrent": 1500, "velocity": { "p": 1.0, "i": 0.5, "d": 0.25, "qpps": 3000 },
//!                 "maxVelocity": 3000, "acceleration": 6000 },
//!   "angle":    { "maxCurrent": 1000, "velocity": { ... },
//!                 "position": { "p": 20.0, "i": 0.0, "d": 10.0, "maxi": 0, "deadzone": 5 },
//!                 "hardstop": { "count": 1600, "angle": 45.0 },
//!                 "accel": 2000, "speed": 1500, "decel": 2000 }
//! }
//! ```
//!
//! A `port` of `"TEST"` selects the simulated controller.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::roboclaw::{POSITION_PID_SCALE, VELOCITY_PID_SCALE};

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub port: String,
    pub baudrate: u32,
    /// Per-attempt read timeout in seconds
    pub timeout: f64,
    pub retries: u32,
}

impl ConnectParams {
    /// Unrepresentable timeouts read as zero; `validate_config` rejects them
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or_default()
    }
}

/// Velocity PID coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityPid {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub qpps: u32,
}

/// Position PID coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPid {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub maxi: u32,
    pub deadzone: u32,
}

/// Steering travel limit, both in encoder counts and in degrees off center
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hardstop {
    pub count: i32,
    pub angle: f64,
}

/// Calibration for velocity-controlled (wheel) motors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VelocityProfile {
    /// Current limit in units of 10 mA
    pub max_current: u32,
    pub velocity: VelocityPid,
    /// QPPS corresponding to 100% velocity
    pub max_velocity: u32,
    pub acceleration: u32,
}

/// Calibration for angle-controlled (steering) motors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AngleProfile {
    /// Current limit in units of 10 mA
    pub max_current: u32,
    pub velocity: VelocityPid,
    pub position: PositionPid,
    pub hardstop: Hardstop,
    pub accel: u32,
    pub speed: u32,
    pub decel: u32,
}

/// The whole RoboClaw configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoboClawConfig {
    pub connect: ConnectParams,
    pub velocity: VelocityProfile,
    pub angle: AngleProfile,
}

/// Load and validate a configuration file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RoboClawConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&content)
}

/// Parse and validate a configuration document
pub fn parse_config(content: &str) -> Result<RoboClawConfig, ConfigError> {
    let config: RoboClawConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Gains go on the wire as unsigned fixed point, `gain * scale` in a u32
fn check_gains(field: &'static str, gains: &[f64], scale: f64) -> Result<(), ConfigError> {
    let max = u32::MAX as f64 / scale;
    for &gain in gains {
        if !(0.0..=max).contains(&gain) {
            return Err(invalid(
                field,
                format!("PID gain {} outside 0 to {}", gain, max),
            ));
        }
    }
    Ok(())
}

/// Semantic checks serde cannot express
pub fn validate_config(config: &RoboClawConfig) -> Result<(), ConfigError> {
    let connect = &config.connect;
    if connect.port.is_empty() {
        return Err(invalid("connect.port", "must not be empty"));
    }
    if connect.baudrate == 0 {
        return Err(invalid("connect.baudrate", "must be positive"));
    }
    if Duration::try_from_secs_f64(connect.timeout).is_err() {
        return Err(invalid(
            "connect.timeout",
            format!("{} is not a non-negative number of seconds", connect.timeout),
        ));
    }

    let velocity = &config.velocity;
    let v = &velocity.velocity;
    check_gains("velocity.velocity", &[v.p, v.i, v.d], VELOCITY_PID_SCALE)?;
    // Signed QPPS on the wire
    if velocity.max_velocity > i32::MAX as u32 {
        return Err(invalid(
            "velocity.maxVelocity",
            format!("{} exceeds {}", velocity.max_velocity, i32::MAX),
        ));
    }

    let angle = &config.angle;
    let v = &angle.velocity;
    check_gains("angle.velocity", &[v.p, v.i, v.d], VELOCITY_PID_SCALE)?;
    let p = &angle.position;
    check_gains("angle.position", &[p.p, p.i, p.d], POSITION_PID_SCALE)?;

    if angle.hardstop.count <= 0 {
        return Err(invalid(
            "angle.hardstop.count",
            format!("{} must be positive", angle.hardstop.count),
        ));
    }
    if !angle.hardstop.angle.is_finite() || angle.hardstop.angle <= 0.0 {
        return Err(invalid(
            "angle.hardstop.angle",
            format!("{} must be positive", angle.hardstop.angle),
        ));
    }

    Ok(())
}
