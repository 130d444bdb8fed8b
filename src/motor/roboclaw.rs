// RoboClaw packet serial protocol over a serial port
//
// Packet format: [Address, Command, Data..., CRC16 hi, CRC16 lo]
// Multi-byte fields are big-endian. Writes are acknowledged with 0xFF.
// Read requests carry no CRC; the reply ends with a CRC16 computed over the
// request header and the reply data.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::id::Channel;
use super::transport::{Reply, Transport};

/// Acknowledgement byte for write commands
const ACK: u8 = 0xFF;

/// Longest version string the controller sends, including the terminator
const MAX_VERSION_LEN: usize = 48;

/// Fixed point scale for velocity PID gains
pub(crate) const VELOCITY_PID_SCALE: f64 = 65536.0;
/// Fixed point scale for position PID gains
pub(crate) const POSITION_PID_SCALE: f64 = 1024.0;

/// Command numbers used by the rover
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    ForwardBackwardM1 = 6,
    ForwardBackwardM2 = 7,
    ReadVersion = 21,
    SetEncoderM1 = 22,
    SetEncoderM2 = 23,
    ReadMainBatteryVoltage = 24,
    SetVelocityPidM1 = 28,
    SetVelocityPidM2 = 29,
    SpeedAccelM1 = 38,
    SpeedAccelM2 = 39,
    SetPositionPidM1 = 61,
    SetPositionPidM2 = 62,
    SpeedAccelDecelPositionM1 = 65,
    SpeedAccelDecelPositionM2 = 66,
    SetMaxCurrentM1 = 133,
    SetMaxCurrentM2 = 134,
}

impl Command {
    /// Pick the M1 or M2 variant of a per-channel command
    fn for_channel(channel: Channel, m1: Command, m2: Command) -> Command {
        match channel {
            Channel::M1 => m1,
            Channel::M2 => m2,
        }
    }
}

/// Error types for RoboClaw serial communication
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port {0} is not open")]
    NotOpen(String),

    #[error("CRC mismatch on {command:?} @ {address}")]
    ChecksumMismatch { address: u8, command: Command },

    #[error("{command:?} @ {address} not acknowledged (got 0x{got:02X})")]
    NotAcknowledged { address: u8, command: Command, got: u8 },

    #[error("Timeout waiting for {command:?} @ {address}")]
    Timeout { address: u8, command: Command },
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// CRC-16/XMODEM as used by the RoboClaw (poly 0x1021, init 0)
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Build a write packet with trailing CRC
fn build_packet(address: u8, command: Command, data: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(4 + data.len());
    packet.push(address);
    packet.push(command as u8);
    packet.extend_from_slice(data);

    let crc = crc16(&packet);
    packet.extend_from_slice(&crc.to_be_bytes());
    packet
}

/// Big-endian payload builder
#[derive(Default)]
struct Payload(Vec<u8>);

impl Payload {
    fn u8(mut self, value: u8) -> Self {
        self.0.push(value);
        self
    }

    fn u32(mut self, value: u32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn i32(mut self, value: i32) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Gain as unsigned fixed point
    fn gain(self, value: f64, scale: f64) -> Self {
        self.u32((value * scale) as u32)
    }

    fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Decode a NUL-terminated version reply (terminator included in `data`)
fn parse_version(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim_end().to_string()
}

/// RoboClaw on a serial port
pub struct RoboClawBus {
    port_name: String,
    baudrate: u32,
    timeout: Duration,
    retries: u32,
    port: Option<Box<dyn SerialPort>>,
}

impl RoboClawBus {
    /// Describe a connection; nothing is opened until `Transport::open`
    pub fn new(port_name: &str, baudrate: u32, timeout: Duration, retries: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baudrate,
            timeout,
            retries,
            port: None,
        }
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        let name = &self.port_name;
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::NotOpen(name.clone()))
    }

    fn map_timeout(e: std::io::Error, address: u8, command: Command) -> TransportError {
        if e.kind() == std::io::ErrorKind::TimedOut {
            TransportError::Timeout { address, command }
        } else {
            TransportError::Io(e)
        }
    }

    /// Run `op` up to `retries + 1` times, clearing stale input between attempts
    fn with_retries<T>(
        &mut self,
        address: u8,
        command: Command,
        mut op: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op(self) {
                Ok(value) => return Ok(value),
                Err(e @ TransportError::NotOpen(_)) => return Err(e),
                Err(e) if attempt >= self.retries => {
                    warn!("{:?} @ {} failed after {} attempts: {}", command, address, attempt + 1, e);
                    return Err(e);
                }
                Err(e) => {
                    debug!("{:?} @ {} attempt {} failed: {}", command, address, attempt + 1, e);
                    if let Ok(port) = self.port() {
                        let _ = port.clear(serialport::ClearBuffer::Input);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Send a write command and wait for the 0xFF acknowledgement
    fn write_command(&mut self, address: u8, command: Command, data: &[u8]) -> Result<()> {
        let packet = build_packet(address, command, data);
        debug!("Write {:?} @ {}: {:02X?}", command, address, packet);

        self.with_retries(address, command, |bus| {
            let port = bus.port()?;
            port.write_all(&packet)?;
            port.flush()?;

            let mut ack = [0u8; 1];
            port.read_exact(&mut ack)
                .map_err(|e| Self::map_timeout(e, address, command))?;
            if ack[0] != ACK {
                return Err(TransportError::NotAcknowledged {
                    address,
                    command,
                    got: ack[0],
                });
            }
            Ok(())
        })
    }

    /// Send a read request; `read_body` pulls the reply data, then the CRC is checked
    fn read_command(
        &mut self,
        address: u8,
        command: Command,
        read_body: impl Fn(&mut dyn SerialPort) -> std::io::Result<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        self.with_retries(address, command, |bus| {
            let port = bus.port()?;
            let header = [address, command as u8];
            port.write_all(&header)?;
            port.flush()?;

            let body = read_body(&mut **port).map_err(|e| Self::map_timeout(e, address, command))?;

            let mut crc_bytes = [0u8; 2];
            port.read_exact(&mut crc_bytes)
                .map_err(|e| Self::map_timeout(e, address, command))?;

            let mut checked = header.to_vec();
            checked.extend_from_slice(&body);
            if crc16(&checked) != u16::from_be_bytes(crc_bytes) {
                return Err(TransportError::ChecksumMismatch { address, command });
            }
            Ok(body)
        })
    }

    fn read_fixed(&mut self, address: u8, command: Command, len: usize) -> Result<Vec<u8>> {
        self.read_command(address, command, |port| {
            let mut body = vec![0u8; len];
            port.read_exact(&mut body)?;
            Ok(body)
        })
    }

    fn write_ok(&mut self, address: u8, command: Command, data: &[u8]) -> bool {
        match self.write_command(address, command, data) {
            Ok(()) => true,
            Err(e) => {
                warn!("RoboClaw write {:?} @ {} failed: {}", command, address, e);
                false
            }
        }
    }
}

impl Transport for RoboClawBus {
    fn open(&mut self) -> bool {
        info!("Opening RoboClaw on {} @ {}", self.port_name, self.baudrate);
        match serialport::new(&self.port_name, self.baudrate)
            .timeout(self.timeout)
            .open()
        {
            Ok(port) => {
                self.port = Some(port);
                true
            }
            Err(e) => {
                warn!("Could not open {}: {}", self.port_name, e);
                false
            }
        }
    }

    fn read_version(&mut self, address: u8) -> Reply<String> {
        let result = self.read_command(address, Command::ReadVersion, |port| {
            let mut body = Vec::with_capacity(MAX_VERSION_LEN);
            let mut byte = [0u8; 1];
            while body.len() < MAX_VERSION_LEN {
                port.read_exact(&mut byte)?;
                body.push(byte[0]);
                if byte[0] == 0 {
                    break;
                }
            }
            Ok(body)
        });

        match result {
            Ok(body) => Reply::Success(parse_version(&body)),
            Err(e) => {
                warn!("RoboClaw ReadVersion @ {} failed: {}", address, e);
                Reply::Failure { raw: vec![0] }
            }
        }
    }

    fn read_main_battery_voltage(&mut self, address: u8) -> Reply<u16> {
        match self.read_fixed(address, Command::ReadMainBatteryVoltage, 2) {
            Ok(body) => Reply::Success(u16::from_be_bytes([body[0], body[1]])),
            Err(e) => {
                warn!("RoboClaw ReadMainBatteryVoltage @ {} failed: {}", address, e);
                Reply::Failure { raw: vec![0] }
            }
        }
    }

    fn forward_backward(&mut self, address: u8, channel: Channel, level: u8) -> bool {
        let command = Command::for_channel(
            channel,
            Command::ForwardBackwardM1,
            Command::ForwardBackwardM2,
        );
        self.write_ok(address, command, &Payload::default().u8(level).into_bytes())
    }

    fn set_max_current(&mut self, address: u8, channel: Channel, current: u32) -> bool {
        let command =
            Command::for_channel(channel, Command::SetMaxCurrentM1, Command::SetMaxCurrentM2);
        // Max current followed by a zero min current
        let data = Payload::default().u32(current).u32(0).into_bytes();
        self.write_ok(address, command, &data)
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
        let command =
            Command::for_channel(channel, Command::SetVelocityPidM1, Command::SetVelocityPidM2);
        self.write_ok(address, command, &velocity_pid_payload(p, i, d, qpps))
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
        let command =
            Command::for_channel(channel, Command::SetPositionPidM1, Command::SetPositionPidM2);
        let data = Payload::default()
            .gain(d, POSITION_PID_SCALE)
            .gain(p, POSITION_PID_SCALE)
            .gain(i, POSITION_PID_SCALE)
            .u32(maxi)
            .u32(deadzone)
            .i32(min)
            .i32(max)
            .into_bytes();
        self.write_ok(address, command, &data)
    }

    fn speed_accel(&mut self, address: u8, channel: Channel, accel: u32, qpps: i32) -> bool {
        let command = Command::for_channel(channel, Command::SpeedAccelM1, Command::SpeedAccelM2);
        let data = Payload::default().u32(accel).i32(qpps).into_bytes();
        self.write_ok(address, command, &data)
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
        let command = Command::for_channel(
            channel,
            Command::SpeedAccelDecelPositionM1,
            Command::SpeedAccelDecelPositionM2,
        );
        let data = Payload::default()
            .u32(accel)
            .u32(speed)
            .u32(decel)
            .i32(position)
            .u8(immediate as u8)
            .into_bytes();
        self.write_ok(address, command, &data)
    }

    fn set_encoder(&mut self, address: u8, channel: Channel, value: i32) -> bool {
        let command = Command::for_channel(channel, Command::SetEncoderM1, Command::SetEncoderM2);
        self.write_ok(address, command, &Payload::default().i32(value).into_bytes())
    }
}

/// D, P, I as 16.16 fixed point, then QPPS
fn velocity_pid_payload(p: f64, i: f64, d: f64, qpps: u32) -> Vec<u8> {
    Payload::default()
        .gain(d, VELOCITY_PID_SCALE)
        .gain(p, VELOCITY_PID_SCALE)
        .gain(i, VELOCITY_PID_SCALE)
        .u32(qpps)
        .into_bytes()
}
