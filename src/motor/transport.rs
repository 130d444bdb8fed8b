// Driver capability shared by the serial RoboClaw and the simulator
//
// Reads come back as a Reply (status flag plus payload), writes as a bool.
// adapt_read/adapt_write are the only places those conventions are turned
// into MotorError.

use super::error::{MotorError, Result};
use super::id::Channel;

/// Outcome of a driver read
///
/// The payload type fixes the arity: a single value for one-element reads,
/// a tuple for reads that return several fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    Success(T),
    /// Leading status flag was a failure; `raw` is whatever came back
    Failure { raw: Vec<u8> },
}

impl<T> Reply<T> {
    /// Build a reply from a status flag (non-zero is success)
    pub fn from_status(status: u8, payload: T) -> Self {
        if status != 0 {
            Reply::Success(payload)
        } else {
            Reply::Failure { raw: vec![status] }
        }
    }
}

/// Turn a driver read into a value, or a DriverError carrying `context`
pub fn adapt_read<T>(reply: Reply<T>, context: impl Into<String>) -> Result<T> {
    match reply {
        Reply::Success(value) => Ok(value),
        Reply::Failure { raw } => Err(MotorError::DriverError {
            context: context.into(),
            raw: Some(format!("{:02X?}", raw)),
        }),
    }
}

/// Turn a driver write acknowledgement into unit, or a DriverError carrying `context`
pub fn adapt_write(ok: bool, context: impl Into<String>) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(MotorError::DriverError {
            context: context.into(),
            raw: None,
        })
    }
}

/// Everything the rover needs from a motor controller
///
/// Writes return `true` when the controller acknowledged the command.
pub trait Transport: Send {
    fn open(&mut self) -> bool;

    fn read_version(&mut self, address: u8) -> Reply<String>;

    /// Main battery voltage in tenths of a volt
    fn read_main_battery_voltage(&mut self, address: u8) -> Reply<u16>;

    /// 0 full reverse, 64 stop, 127 full forward
    fn forward_backward(&mut self, address: u8, channel: Channel, level: u8) -> bool;

    /// Current limit in units of 10 mA
    fn set_max_current(&mut self, address: u8, channel: Channel, current: u32) -> bool;

    fn set_velocity_pid(
        &mut self,
        address: u8,
        channel: Channel,
        p: f64,
        i: f64,
        d: f64,
        qpps: u32,
    ) -> bool;

    #[allow(clippy::too_many_arguments)]
    fn set_position_pid(
        &mut self,
        address: u8,
        channel: Channel,
        p: f64,
        i: f64,
        d: f64,
        maxi: u32,
        deadzone: u32,
        min: i32,
        max: i32,
    ) -> bool;

    fn speed_accel(&mut self, address: u8, channel: Channel, accel: u32, qpps: i32) -> bool;

    #[allow(clippy::too_many_arguments)]
    fn speed_accel_decel_position(
        &mut self,
        address: u8,
        channel: Channel,
        accel: u32,
        speed: u32,
        decel: u32,
        position: i32,
        immediate: bool,
    ) -> bool;

    fn set_encoder(&mut self, address: u8, channel: Channel, value: i32) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failure_flag() {
        let reply: Reply<u16> = Reply::from_status(0, 0);
        match adapt_read(reply, "RoboClaw ReadMainBatteryVoltage @ 128") {
            Err(MotorError::DriverError { context, raw }) => {
                assert_eq!(context, "RoboClaw ReadMainBatteryVoltage @ 128");
                assert_eq!(raw.as_deref(), Some("[00]"));
            }
            other => panic!("expected DriverError, got {:?}", other),
        }
    }

    #[test]
    fn test_read_single_value_unwrapped() {
        let reply = Reply::from_status(1, 123u16);
        assert_eq!(adapt_read(reply, "read").unwrap(), 123);
    }

    #[test]
    fn test_read_multiple_values_keep_order() {
        let reply = Reply::from_status(1, (-42i32, 0x80u8));
        assert_eq!(adapt_read(reply, "read").unwrap(), (-42, 0x80));
    }

    #[test]
    fn test_write() {
        assert!(adapt_write(true, "write").is_ok());
        assert!(matches!(
            adapt_write(false, "write"),
            Err(MotorError::DriverError { raw: None, .. })
        ));
    }
}
