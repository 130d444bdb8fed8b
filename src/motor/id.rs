// Motor identifiers: (controller address, channel, inverted)
//
// Every command names its motor with one of these. The fields are private so
// a MotorId can only come out of validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{MotorError, Result};

/// Lowest packet-serial address a RoboClaw answers to
pub const MIN_ADDRESS: u8 = 128;
/// Highest packet-serial address a RoboClaw answers to
pub const MAX_ADDRESS: u8 = 135;

/// One of the two motor outputs on a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    M1,
    M2,
}

impl Channel {
    pub fn number(self) -> u8 {
        match self {
            Channel::M1 => 1,
            Channel::M2 => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.number())
    }
}

/// A validated motor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct MotorId {
    address: u8,
    channel: Channel,
    inverted: bool,
}

impl MotorId {
    /// Validate an address/channel/inversion triple
    pub fn new(address: i64, channel: i64, inverted: bool) -> Result<Self> {
        if address < MIN_ADDRESS as i64 || address > MAX_ADDRESS as i64 {
            return Err(MotorError::InvalidIdentifier(format!(
                "RoboClaw address must be in the range of {} to {} (inclusive), got {}",
                MIN_ADDRESS, MAX_ADDRESS, address
            )));
        }

        let channel = match channel {
            1 => Channel::M1,
            2 => Channel::M2,
            other => {
                return Err(MotorError::InvalidIdentifier(format!(
                    "RoboClaw motor number must be 1 or 2, got {}",
                    other
                )));
            }
        };

        Ok(Self {
            address: address as u8,
            channel,
            inverted,
        })
    }

    /// Validate an untyped identifier such as `[128, 1, false]`
    ///
    /// Must be an array of exactly three elements: an integer address, an
    /// integer motor number and a strict boolean.
    pub fn validate(raw: &Value) -> Result<Self> {
        let fields = raw.as_array().ok_or_else(|| {
            MotorError::InvalidIdentifier("RoboClaw motor identifier must be a tuple".to_string())
        })?;

        if fields.len() != 3 {
            return Err(MotorError::InvalidIdentifier(
                "RoboClaw motor identifier must have three elements: address, motor number, and whether it is inverted"
                    .to_string(),
            ));
        }

        let address = fields[0].as_i64().ok_or_else(|| {
            MotorError::InvalidIdentifier("RoboClaw address must be an integer".to_string())
        })?;
        let channel = fields[1].as_i64().ok_or_else(|| {
            MotorError::InvalidIdentifier("RoboClaw motor number must be an integer".to_string())
        })?;
        let inverted = fields[2].as_bool().ok_or_else(|| {
            MotorError::InvalidIdentifier("Inverted status must be a boolean".to_string())
        })?;

        Self::new(address, channel, inverted)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn inverted(&self) -> bool {
        self.inverted
    }
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.channel, self.address)?;
        if self.inverted {
            write!(f, " (inverted)")?;
        }
        Ok(())
    }
}

impl TryFrom<(i64, i64, bool)> for MotorId {
    type Error = MotorError;

    fn try_from((address, channel, inverted): (i64, i64, bool)) -> Result<Self> {
        Self::new(address, channel, inverted)
    }
}

impl TryFrom<Value> for MotorId {
    type Error = MotorError;

    fn try_from(raw: Value) -> Result<Self> {
        Self::validate(&raw)
    }
}

impl From<MotorId> for Value {
    fn from(id: MotorId) -> Self {
        serde_json::json!([id.address, id.channel.number(), id.inverted])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_identifier() {
        let id = MotorId::validate(&json!([128, 1, false])).unwrap();
        assert_eq!(id.address(), 128);
        assert_eq!(id.channel(), Channel::M1);
        assert!(!id.inverted());

        let id = MotorId::new(135, 2, true).unwrap();
        assert_eq!(id.channel(), Channel::M2);
        assert!(id.inverted());
    }

    #[test]
    fn test_address_window() {
        assert!(matches!(
            MotorId::validate(&json!([127, 1, false])),
            Err(MotorError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            MotorId::new(136, 1, false),
            Err(MotorError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_bad_channel() {
        assert!(matches!(
            MotorId::validate(&json!([128, 3, false])),
            Err(MotorError::InvalidIdentifier(_))
        ));
        assert!(MotorId::new(128, 0, false).is_err());
    }

    #[test]
    fn test_inversion_must_be_strict_boolean() {
        assert!(matches!(
            MotorId::validate(&json!([128, 1, "no"])),
            Err(MotorError::InvalidIdentifier(_))
        ));
        // Truthy values are not booleans
        assert!(MotorId::validate(&json!([128, 1, 0])).is_err());
    }

    #[test]
    fn test_wrong_shape() {
        assert!(MotorId::validate(&json!([128, 1])).is_err());
        assert!(MotorId::validate(&json!([128, 1, false, 0])).is_err());
        assert!(MotorId::validate(&json!({"address": 128})).is_err());
        assert!(MotorId::validate(&json!([128.5, 1, false])).is_err());
    }

    #[test]
    fn test_serde_uses_triple() {
        let id: MotorId = serde_json::from_str("[130, 2, true]").unwrap();
        assert_eq!(id, MotorId::new(130, 2, true).unwrap());
        assert_eq!(serde_json::to_string(&id).unwrap(), "[130,2,true]");

        assert!(serde_json::from_str::<MotorId>("[130, 2]").is_err());
    }

    #[test]
    fn test_display() {
        let id = MotorId::new(129, 2, true).unwrap();
        assert_eq!(id.to_string(), "M2@129 (inverted)");
    }
}
