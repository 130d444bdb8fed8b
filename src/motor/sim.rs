// Simulated RoboClaw for running the rover without hardware
//
// Acknowledges everything. With a CallLog attached it also records the calls
// it received; the log is shared so a caller can hold on to it after the
// transport has been moved into a controller. Without one nothing is kept, so
// a long-running simulated rover does not grow memory per command.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::id::Channel;
use super::transport::{Reply, Transport};

pub const SIM_VERSION: &str = "USB Roboclaw 2x7a v4.1.34 (simulated)";

/// One driver call as seen by the simulator
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Open,
    ReadVersion { address: u8 },
    ReadMainBatteryVoltage { address: u8 },
    ForwardBackward { address: u8, channel: Channel, level: u8 },
    SetMaxCurrent { address: u8, channel: Channel, current: u32 },
    SetVelocityPid { address: u8, channel: Channel, p: f64, i: f64, d: f64, qpps: u32 },
    SetPositionPid {
        address: u8,
        channel: Channel,
        p: f64,
        i: f64,
        d: f64,
        maxi: u32,
        deadzone: u32,
        min: i32,
        max: i32,
    },
    SpeedAccel { address: u8, channel: Channel, accel: u32, qpps: i32 },
    SpeedAccelDecelPosition {
        address: u8,
        channel: Channel,
        accel: u32,
        speed: u32,
        decel: u32,
        position: i32,
        immediate: bool,
    },
    SetEncoder { address: u8, channel: Channel, value: i32 },
}

impl DriverCall {
    /// Operation name, used to script failures
    pub fn name(&self) -> &'static str {
        match self {
            DriverCall::Open => "open",
            DriverCall::ReadVersion { .. } => "read_version",
            DriverCall::ReadMainBatteryVoltage { .. } => "read_main_battery_voltage",
            DriverCall::ForwardBackward { .. } => "forward_backward",
            DriverCall::SetMaxCurrent { .. } => "set_max_current",
            DriverCall::SetVelocityPid { .. } => "set_velocity_pid",
            DriverCall::SetPositionPid { .. } => "set_position_pid",
            DriverCall::SpeedAccel { .. } => "speed_accel",
            DriverCall::SpeedAccelDecelPosition { .. } => "speed_accel_decel_position",
            DriverCall::SetEncoder { .. } => "set_encoder",
        }
    }
}

/// Shared view of the calls a SimTransport has received
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DriverCall>>>);

impl CallLog {
    fn push(&self, call: DriverCall) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// In-process stand-in for a RoboClaw
#[derive(Debug)]
pub struct SimTransport {
    log: Option<CallLog>,
    voltage_tenths: u16,
    failing: HashSet<&'static str>,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTransport {
    pub fn new() -> Self {
        Self {
            log: None,
            voltage_tenths: 120,
            failing: HashSet::new(),
        }
    }

    /// Battery reading returned by read_main_battery_voltage, in tenths of a volt
    pub fn with_voltage(mut self, tenths: u16) -> Self {
        self.voltage_tenths = tenths;
        self
    }

    /// Make every call to the named operation report failure
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Record every call into `log`
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    fn record(&mut self, call: DriverCall) -> bool {
        let name = call.name();
        debug!("Simulated RoboClaw: {:?}", call);
        if let Some(log) = &self.log {
            log.push(call);
        }
        !self.failing.contains(name)
    }

    fn read<T>(&mut self, call: DriverCall, payload: T) -> Reply<T> {
        if self.record(call) {
            Reply::Success(payload)
        } else {
            Reply::Failure { raw: vec![0] }
        }
    }
}

impl Transport for SimTransport {
    fn open(&mut self) -> bool {
        self.record(DriverCall::Open)
    }

    fn read_version(&mut self, address: u8) -> Reply<String> {
        self.read(DriverCall::ReadVersion { address }, SIM_VERSION.to_string())
    }

    fn read_main_battery_voltage(&mut self, address: u8) -> Reply<u16> {
        let tenths = self.voltage_tenths;
        self.read(DriverCall::ReadMainBatteryVoltage { address }, tenths)
    }

    fn forward_backward(&mut self, address: u8, channel: Channel, level: u8) -> bool {
        self.record(DriverCall::ForwardBackward {
            address,
            channel,
            level,
        })
    }

    fn set_max_current(&mut self, address: u8, channel: Channel, current: u32) -> bool {
        self.record(DriverCall::SetMaxCurrent {
            address,
            channel,
            current,
        })
    }

    fn set_velocity_pid(
        &mut self,
        address: u8,
        channel: Channel,
        p: f64,
        i: f64,
        d: f64,
        qpps: u32,
    ) -> bool {
        self.record(DriverCall::SetVelocityPid {
            address,
            channel,
            p,
            i,
            d,
            qpps,
        })
    }

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
    ) -> bool {
        self.record(DriverCall::SetPositionPid {
            address,
            channel,
            p,
            i,
            d,
            maxi,
            deadzone,
            min,
            max,
        })
    }

    fn speed_accel(&mut self, address: u8, channel: Channel, accel: u32, qpps: i32) -> bool {
        self.record(DriverCall::SpeedAccel {
            address,
            channel,
            accel,
            qpps,
        })
    }

    fn speed_accel_decel_position(
        &mut self,
        address: u8,
        channel: Channel,
        accel: u32,
        speed: u32,
        decel: u32,
        position: i32,
        immediate: bool,
    ) -> bool {
        self.record(DriverCall::SpeedAccelDecelPosition {
            address,
            channel,
            accel,
            speed,
            decel,
            position,
            immediate,
        })
    }

    fn set_encoder(&mut self, address: u8, channel: Channel, value: i32) -> bool {
        self.record(DriverCall::SetEncoder {
            address,
            channel,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let log = CallLog::default();
        let mut sim = SimTransport::new().with_log(log.clone());

        assert!(sim.open());
        assert!(sim.set_encoder(128, Channel::M2, 0));

        assert_eq!(
            log.calls(),
            vec![
                DriverCall::Open,
                DriverCall::SetEncoder {
                    address: 128,
                    channel: Channel::M2,
                    value: 0
                }
            ]
        );
    }

    #[test]
    fn test_scripted_failure() {
        let log = CallLog::default();
        let mut sim = SimTransport::new()
            .failing("read_version")
            .with_log(log.clone());
        assert_eq!(sim.read_version(128), Reply::Failure { raw: vec![0] });
        // Failed calls are still logged
        assert_eq!(log.len(), 1);
        assert!(sim.forward_backward(128, Channel::M1, 64));
    }

    #[test]
    fn test_voltage() {
        let mut sim = SimTransport::new().with_voltage(168);
        assert_eq!(sim.read_main_battery_voltage(129), Reply::Success(168));
    }

    #[test]
    fn test_unlogged_sim_keeps_nothing() {
        let mut sim = SimTransport::new();
        for _ in 0..10_000 {
            assert!(sim.forward_backward(128, Channel::M1, 64));
        }
        assert!(sim.log.is_none());

        // A log attached later only sees calls from then on
        let log = CallLog::default();
        let mut sim = sim.with_log(log.clone());
        assert!(sim.set_encoder(128, Channel::M2, 0));
        assert_eq!(log.len(), 1);
    }
}
