// Timeouts, topics, configuration defaults
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for the wheel watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_MOTOR: &str = "rover/cmd/motor"; // commands
pub const TOPIC_OUTCOME_MOTOR: &str = "rover/state/motor"; // per-command results
pub const TOPIC_HEALTH: &str = "rover/state/health"; // health status

// RoboClaw calibration and connection parameters
pub const DEFAULT_CONFIG_PATH: &str = "config/roboclaw.json";

// Port name that selects the simulated controller instead of a serial port
pub const SIMULATION_PORT: &str = "TEST";
