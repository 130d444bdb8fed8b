// High-level RoboClaw driver for rover wheels and steering
//
// Takes planner units (percent power, percent velocity, degrees off center),
// converts them to RoboClaw native values and applies the calibration
// sequences. Every motor command goes through the same steps: the MotorId
// has already been validated, the connection gate is checked, the value is
// converted, and the driver's reply is adapted into a Result.

use std::path::Path;

use tracing::{debug, info, warn};

use super::convert::{angle_position, power_level, velocity_qpps};
use super::error::{MotorError, Result};
use super::id::MotorId;
use super::params::{load_config, AngleProfile, PositionPid, RoboClawConfig, VelocityPid, VelocityProfile};
use super::roboclaw::RoboClawBus;
use super::sim::SimTransport;
use super::transport::{adapt_read, adapt_write, Transport};
use crate::config::SIMULATION_PORT;

/// Position moves always execute at once instead of queuing behind buffered moves
const IMMEDIATE_EXECUTION: bool = true;

/// Live controller plus the calibration loaded alongside it
struct Connection {
    transport: Box<dyn Transport>,
    velocity: VelocityProfile,
    angle: AngleProfile,
}

/// RoboClaw driver for the rover
///
/// Starts disconnected; every motor command fails with `NotConnected` until
/// `connect` succeeds.
#[derive(Default)]
pub struct MotorDriver {
    connection: Option<Connection>,
}

impl MotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the configuration file and connect with it
    pub fn connect_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let config = load_config(path)?;
        self.connect(&config)
    }

    /// Create the controller handle described by `config`
    ///
    /// A port named `"TEST"` selects the simulated controller.
    pub fn connect(&mut self, config: &RoboClawConfig) -> Result<()> {
        let connect = &config.connect;
        let transport: Box<dyn Transport> = if connect.port == SIMULATION_PORT {
            info!("Using simulated RoboClaw");
            Box::new(SimTransport::new())
        } else {
            Box::new(RoboClawBus::new(
                &connect.port,
                connect.baudrate,
                connect.timeout(),
                connect.retries,
            ))
        };

        self.connect_with(transport, config)
    }

    /// Connect through an already constructed transport
    pub fn connect_with(
        &mut self,
        mut transport: Box<dyn Transport>,
        config: &RoboClawConfig,
    ) -> Result<()> {
        if !transport.open() {
            return Err(MotorError::ConnectionError {
                port: config.connect.port.clone(),
                baudrate: config.connect.baudrate,
            });
        }

        if self.connection.is_some() {
            warn!("RoboClaw already connected, replacing connection");
        }

        info!(
            "RoboClaw connected on {} @ {}",
            config.connect.port, config.connect.baudrate
        );
        self.connection = Some(Connection {
            transport,
            velocity: config.velocity.clone(),
            angle: config.angle.clone(),
        });
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connection gate, checked before every command
    fn require_connected(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(MotorError::NotConnected)
    }

    /// Firmware version string for display
    pub fn version(&mut self, id: MotorId) -> Result<String> {
        let conn = self.require_connected()?;
        let address = id.address();

        adapt_read(
            conn.transport.read_version(address),
            format!("RoboClaw ReadVersion @ {}", address),
        )
    }

    /// Input voltage available to drive the motor, in volts
    pub fn input_voltage(&mut self, id: MotorId) -> Result<f64> {
        let conn = self.require_connected()?;
        let address = id.address();

        let tenths = adapt_read(
            conn.transport.read_main_battery_voltage(address),
            format!("Read voltage of RoboClaw @{}", address),
        )?;

        Ok(tenths as f64 / 10.0)
    }

    /// Run the motor at a percentage of maximum power
    ///
    /// 100 is full forward, -100 is full reverse, 0 cuts power. Inversion is
    /// not applied; direction is up to the caller.
    pub fn power_percent(&mut self, id: MotorId, percentage: i32) -> Result<()> {
        let conn = self.require_connected()?;
        let level = power_level(percentage)?;

        let context = format!(
            "RoboClaw {} power at {} representing {} percent",
            id, level, percentage
        );
        debug!("{}", context);

        adapt_write(
            conn.transport
                .forward_backward(id.address(), id.channel(), level),
            context,
        )
    }

    /// Restrict the motor's maximum current draw, in units of 10 mA
    pub fn set_max_current(&mut self, id: MotorId, current: u32) -> Result<()> {
        let conn = self.require_connected()?;

        let context = format!("Restricting RoboClaw {} to {} * 10 mA", id, current);
        debug!("{}", context);

        adapt_write(
            conn.transport
                .set_max_current(id.address(), id.channel(), current),
            context,
        )
    }

    /// Configure the motor's velocity PID loop
    pub fn set_velocity_pid(&mut self, id: MotorId, pid: &VelocityPid) -> Result<()> {
        let conn = self.require_connected()?;

        let context = format!(
            "RoboClaw {} Velocity P{} I{} D{} QPPS{}",
            id, pid.p, pid.i, pid.d, pid.qpps
        );
        debug!("{}", context);

        adapt_write(
            conn.transport.set_velocity_pid(
                id.address(),
                id.channel(),
                pid.p,
                pid.i,
                pid.d,
                pid.qpps,
            ),
            context,
        )
    }

    /// Configure the motor's position PID loop, limited to `[-limit, limit]`
    pub fn set_position_pid(&mut self, id: MotorId, pid: &PositionPid, limit: i32) -> Result<()> {
        let conn = self.require_connected()?;

        let context = format!(
            "RoboClaw {} Position P{} I{} D{} MaxI{} Deadzone{} from {} to {}",
            id, pid.p, pid.i, pid.d, pid.maxi, pid.deadzone, -limit, limit
        );
        debug!("{}", context);

        adapt_write(
            conn.transport.set_position_pid(
                id.address(),
                id.channel(),
                pid.p,
                pid.i,
                pid.d,
                pid.maxi,
                pid.deadzone,
                -limit,
                limit,
            ),
            context,
        )
    }

    /// Prepare a wheel motor for velocity control
    ///
    /// Max current, then velocity PID. Stops at the first failure without
    /// undoing earlier steps; rerunning the sequence is safe.
    pub fn init_velocity(&mut self, id: MotorId) -> Result<()> {
        let profile = self.require_connected()?.velocity.clone();
        info!("Initializing RoboClaw {} for velocity control", id);

        self.set_max_current(id, profile.max_current)?;
        self.set_velocity_pid(id, &profile.velocity)
    }

    /// Run a wheel motor at a percentage of its configured max velocity
    pub fn velocity(&mut self, id: MotorId, pct_velocity: f64) -> Result<()> {
        let conn = self.require_connected()?;
        let profile = &conn.velocity;

        let qpps = velocity_qpps(pct_velocity, profile.max_velocity, id.inverted())?;
        let acceleration = profile.acceleration;

        let context = format!(
            "Velocity {} acceleration {} on RoboClaw {}",
            qpps, acceleration, id
        );
        debug!("{}", context);

        adapt_write(
            conn.transport
                .speed_accel(id.address(), id.channel(), acceleration, qpps),
            context,
        )
    }

    /// Prepare a steering motor for angle control
    ///
    /// Max current, velocity PID, then position PID limited to the hardstop.
    /// Same abort-without-rollback policy as `init_velocity`.
    pub fn init_angle(&mut self, id: MotorId) -> Result<()> {
        let profile = self.require_connected()?.angle.clone();
        info!("Initializing RoboClaw {} for angle control", id);

        self.set_max_current(id, profile.max_current)?;
        self.set_velocity_pid(id, &profile.velocity)?;
        self.set_position_pid(id, &profile.position, profile.hardstop.count)
    }

    /// Maximum steering angle in degrees off center
    ///
    /// Returned unmodified; callers should keep their own safety margin.
    pub fn maxangle(&mut self, _id: MotorId) -> Result<f64> {
        Ok(self.require_connected()?.angle.hardstop.angle)
    }

    /// Move a steering motor to `degrees` off center, positive clockwise
    pub fn angle(&mut self, id: MotorId, degrees: f64) -> Result<()> {
        let conn = self.require_connected()?;
        let profile = &conn.angle;

        let position = angle_position(degrees, &profile.hardstop, id.inverted())?;
        let (accel, speed, decel) = (profile.accel, profile.speed, profile.decel);

        let context = format!(
            "Position {} via {}/{}/{} on RoboClaw {}",
            position, accel, speed, decel, id
        );
        debug!("{}", context);

        adapt_write(
            conn.transport.speed_accel_decel_position(
                id.address(),
                id.channel(),
                accel,
                speed,
                decel,
                position,
                IMMEDIATE_EXECUTION,
            ),
            context,
        )
    }

    /// Zero the steering motor's encoder (homing)
    pub fn steer_setzero(&mut self, id: MotorId) -> Result<()> {
        let conn = self.require_connected()?;

        let context = format!("Reset encoder on RoboClaw {}", id);
        info!("{}", context);

        adapt_write(
            conn.transport.set_encoder(id.address(), id.channel(), 0),
            context,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::id::Channel;
    use crate::motor::params::tests::sample_config;
    use crate::motor::sim::{CallLog, DriverCall};

    fn wheel() -> MotorId {
        MotorId::new(128, 1, false).unwrap()
    }

    fn connected(sim: SimTransport) -> (MotorDriver, CallLog) {
        let log = CallLog::default();
        let sim = sim.with_log(log.clone());
        let mut driver = MotorDriver::new();
        driver.connect_with(Box::new(sim), &sample_config()).unwrap();
        log.clear();
        (driver, log)
    }

    #[test]
    fn test_commands_before_connect() {
        let mut driver = MotorDriver::new();
        assert!(!driver.is_connected());
        assert!(matches!(
            driver.power_percent(wheel(), 10),
            Err(MotorError::NotConnected)
        ));
        assert!(matches!(
            driver.version(wheel()),
            Err(MotorError::NotConnected)
        ));
        assert!(matches!(
            driver.maxangle(wheel()),
            Err(MotorError::NotConnected)
        ));
    }

    #[test]
    fn test_init_angle_before_connect_issues_no_calls() {
        let log = CallLog::default();
        let sim = SimTransport::new().failing("open").with_log(log.clone());
        let mut driver = MotorDriver::new();

        assert!(matches!(
            driver.connect_with(Box::new(sim), &sample_config()),
            Err(MotorError::ConnectionError { .. })
        ));
        assert!(matches!(
            driver.init_angle(wheel()),
            Err(MotorError::NotConnected)
        ));
        assert!(matches!(
            driver.steer_setzero(wheel()),
            Err(MotorError::NotConnected)
        ));
        // Only the failed open ever reached the transport
        assert_eq!(log.calls(), vec![DriverCall::Open]);
    }

    #[test]
    fn test_connect_simulation_sentinel() {
        let mut driver = MotorDriver::new();
        driver.connect(&sample_config()).unwrap();
        assert!(driver.is_connected());
        assert_eq!(driver.input_voltage(wheel()).unwrap(), 12.0);
    }

    #[test]
    fn test_connect_failure() {
        let mut driver = MotorDriver::new();
        let err = driver
            .connect_with(Box::new(SimTransport::new().failing("open")), &sample_config())
            .unwrap_err();
        assert!(matches!(err, MotorError::ConnectionError { .. }));
        assert!(!driver.is_connected());
    }

    #[test]
    fn test_power_percent_dispatch() {
        let (mut driver, log) = connected(SimTransport::new());
        let inverted_m2 = MotorId::new(129, 2, true).unwrap();

        driver.power_percent(wheel(), 100).unwrap();
        driver.power_percent(inverted_m2, -100).unwrap();

        assert_eq!(
            log.calls(),
            vec![
                DriverCall::ForwardBackward {
                    address: 128,
                    channel: Channel::M1,
                    level: 127
                },
                // Inversion is not applied to raw power
                DriverCall::ForwardBackward {
                    address: 129,
                    channel: Channel::M2,
                    level: 1
                },
            ]
        );
    }

    #[test]
    fn test_power_out_of_range_issues_no_call() {
        let (mut driver, log) = connected(SimTransport::new());
        assert!(matches!(
            driver.power_percent(wheel(), 101),
            Err(MotorError::OutOfRange { .. })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn test_velocity_applies_inversion_and_acceleration() {
        let (mut driver, log) = connected(SimTransport::new());

        driver.velocity(MotorId::new(130, 2, true).unwrap(), 50.0).unwrap();

        assert_eq!(
            log.calls(),
            vec![DriverCall::SpeedAccel {
                address: 130,
                channel: Channel::M2,
                accel: 6000,
                qpps: -1500
            }]
        );
        assert!(matches!(
            driver.velocity(wheel(), 150.0),
            Err(MotorError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_angle_dispatch_is_immediate() {
        let (mut driver, log) = connected(SimTransport::new());

        driver.angle(wheel(), -22.5).unwrap();

        assert_eq!(
            log.calls(),
            vec![DriverCall::SpeedAccelDecelPosition {
                address: 128,
                channel: Channel::M1,
                accel: 2000,
                speed: 1500,
                decel: 2500,
                position: -800,
                immediate: true
            }]
        );

        let max = driver.maxangle(wheel()).unwrap();
        assert!(matches!(
            driver.angle(wheel(), max + 1.0),
            Err(MotorError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_maxangle_is_unmodified() {
        let (mut driver, _log) = connected(SimTransport::new());
        assert_eq!(driver.maxangle(wheel()).unwrap(), 45.0);
        driver.angle(wheel(), 45.0).unwrap();
        driver.init_angle(wheel()).unwrap();
        assert_eq!(driver.maxangle(wheel()).unwrap(), 45.0);
    }

    #[test]
    fn test_init_velocity_sequence_is_repeatable() {
        let (mut driver, log) = connected(SimTransport::new());
        let id = MotorId::new(131, 2, false).unwrap();

        driver.init_velocity(id).unwrap();
        let first = log.calls();
        log.clear();
        driver.init_velocity(id).unwrap();

        assert_eq!(
            first,
            vec![
                DriverCall::SetMaxCurrent {
                    address: 131,
                    channel: Channel::M2,
                    current: 1500
                },
                DriverCall::SetVelocityPid {
                    address: 131,
                    channel: Channel::M2,
                    p: 1.0,
                    i: 0.5,
                    d: 0.25,
                    qpps: 3000
                },
            ]
        );
        assert_eq!(log.calls(), first);
    }

    #[test]
    fn test_init_angle_sequence() {
        let (mut driver, log) = connected(SimTransport::new());

        driver.init_angle(wheel()).unwrap();

        let calls = log.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].name(), "set_max_current");
        assert_eq!(calls[1].name(), "set_velocity_pid");
        assert_eq!(
            calls[2],
            DriverCall::SetPositionPid {
                address: 128,
                channel: Channel::M1,
                p: 20.0,
                i: 0.0,
                d: 10.0,
                maxi: 0,
                deadzone: 5,
                min: -1600,
                max: 1600
            }
        );
    }

    #[test]
    fn test_init_angle_aborts_without_rollback() {
        let (mut driver, log) = connected(SimTransport::new().failing("set_velocity_pid"));

        let err = driver.init_angle(wheel()).unwrap_err();
        assert!(matches!(err, MotorError::DriverError { .. }));
        assert!(err.to_string().contains("Velocity"));

        // Max current stays applied and position PID is never attempted
        let names: Vec<_> = log.calls().iter().map(DriverCall::name).collect();
        assert_eq!(names, vec!["set_max_current", "set_velocity_pid"]);
    }

    #[test]
    fn test_version_read_failure() {
        let (mut driver, _log) = connected(SimTransport::new().failing("read_version"));
        match driver.version(wheel()) {
            Err(MotorError::DriverError { context, .. }) => {
                assert_eq!(context, "RoboClaw ReadVersion @ 128")
            }
            other => panic!("expected DriverError, got {:?}", other),
        }
    }

    #[test]
    fn test_telemetry_is_not_cached() {
        let (mut driver, log) = connected(SimTransport::new().with_voltage(168));
        assert_eq!(driver.input_voltage(wheel()).unwrap(), 16.8);
        assert_eq!(driver.input_voltage(wheel()).unwrap(), 16.8);
        assert!(driver.version(wheel()).unwrap().contains("Roboclaw"));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_steer_setzero() {
        let (mut driver, log) = connected(SimTransport::new());
        driver.steer_setzero(MotorId::new(128, 2, true).unwrap()).unwrap();
        assert_eq!(
            log.calls(),
            vec![DriverCall::SetEncoder {
                address: 128,
                channel: Channel::M2,
                value: 0
            }]
        );
    }
}
