// Error types for the rover motor layer

/// Problems with the calibration/connection configuration document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Error type for every motor command
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    #[error("Invalid motor identifier: {0}")]
    InvalidIdentifier(String),

    #[error("RoboClaw not yet connected")]
    NotConnected,

    #[error("{quantity} {value} outside valid range {min} to {max}")]
    OutOfRange {
        quantity: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Could not connect to RoboClaw. {port} @ {baudrate}")]
    ConnectionError { port: String, baudrate: u32 },

    #[error("{context}{}", raw.as_ref().map(|r| format!(" {}", r)).unwrap_or_default())]
    DriverError {
        context: String,
        raw: Option<String>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Motor command worker has shut down")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, MotorError>;

impl MotorError {
    pub(crate) fn out_of_range(quantity: &'static str, value: f64, limit: f64) -> Self {
        MotorError::OutOfRange {
            quantity,
            value,
            min: -limit,
            max: limit,
        }
    }
}
