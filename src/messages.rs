// Define message types for the runtime

use serde::{Deserialize, Serialize};
use serde_json::Value;

// Command from planner/teleop -> runtime
// The identifier stays untyped here so a malformed one can be reported back
// instead of dropping the whole message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorCommand {
    pub id: Value,
    pub action: MotorAction,
}

/// What to do with the addressed motor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MotorAction {
    Power { percent: i32 },
    Velocity { percent: f64 },
    Angle { degrees: f64 },
    SetZero,
    InitVelocity,
    InitAngle,
    MaxAngle,
    Version,
    InputVoltage,
}

// Result of one command, runtime -> caller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandOutcome {
    pub id: Value,
    pub action: MotorAction,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn success(cmd: &MotorCommand, value: Option<Value>) -> Self {
        Self {
            id: cmd.id.clone(),
            action: cmd.action,
            ok: true,
            value,
            error: None,
        }
    }

    pub fn failure(cmd: &MotorCommand, error: impl ToString) -> Self {
        Self {
            id: cmd.id.clone(),
            action: cmd.action,
            ok: false,
            value: None,
            error: Some(error.to_string()),
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let cmd: MotorCommand = serde_json::from_value(json!({
            "id": [128, 1, false],
            "action": { "type": "velocity", "percent": 25.0 }
        }))
        .unwrap();
        assert_eq!(cmd.action, MotorAction::Velocity { percent: 25.0 });

        let cmd: MotorCommand = serde_json::from_value(json!({
            "id": [129, 2, true],
            "action": { "type": "set_zero" }
        }))
        .unwrap();
        assert_eq!(cmd.action, MotorAction::SetZero);
    }

    #[test]
    fn test_outcome_omits_empty_fields() {
        let cmd = MotorCommand {
            id: json!([128, 1, false]),
            action: MotorAction::InitAngle,
        };
        let text = serde_json::to_string(&CommandOutcome::success(&cmd, None)).unwrap();
        assert!(!text.contains("error"));
        assert!(!text.contains("value"));
    }

    #[test]
    fn test_health_names() {
        assert_eq!(
            serde_json::to_string(&RuntimeHealth::CmdStale).unwrap(),
            "\"cmd_stale\""
        );
    }
}
