// Motor control module for the rover's RoboClaw controllers
//
// Provides:
// - Motor identifier validation
// - Unit conversion (percent power/velocity, degrees) to RoboClaw values
// - RoboClaw packet serial protocol and a simulated controller
// - High-level driver API with calibration sequences
// - A serialized handle for sharing one driver between tasks

pub mod convert;
mod driver;
pub mod error;
pub mod id;
pub mod params;
mod queue;
pub mod roboclaw;
pub mod sim;
pub mod transport;

pub use driver::MotorDriver;
pub use error::{ConfigError, MotorError};
pub use id::{Channel, MotorId};
pub use params::{load_config, parse_config, RoboClawConfig};
pub use queue::ControllerHandle;
pub use roboclaw::{RoboClawBus, TransportError};
pub use sim::SimTransport;
pub use transport::{adapt_read, adapt_write, Reply, Transport};
