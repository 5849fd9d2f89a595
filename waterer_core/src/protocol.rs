//! Command and status payloads.
//!
//! Status (retained, exactly three fields):
//! `{"state":"ON"|"OFF","volumeTarget":<f>,"volumeCurrent":<f>}`
//!
//! Command (both fields optional, applied independently):
//! `{"state":"ON"|"OFF","volume":<f>}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Payloads;
use crate::error::CommandError;

/// What the remote side has asked for.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DispenseRequest {
    pub requested_on: bool,
    pub target_volume_ml: f32,
}

/// Snapshot reported on the status topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispenseStatus {
    pub is_on: bool,
    pub target_volume_ml: f32,
    /// `None` until a dose is running; encoded as `0` on the wire.
    pub current_volume_ml: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub state: String,
    pub volume_target: f32,
    pub volume_current: f32,
}

#[derive(Debug, Deserialize)]
struct CommandMessage {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    volume: Option<f32>,
}

/// A decoded command; `None` fields leave the request untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub state: Option<bool>,
    pub volume_ml: Option<f32>,
}

impl Command {
    /// Partial update: only fields present in the command are written.
    pub fn apply(&self, request: &mut DispenseRequest) {
        if let Some(on) = self.state {
            request.requested_on = on;
        }
        if let Some(ml) = self.volume_ml {
            request.target_volume_ml = ml;
        }
    }
}

/// Decode a command payload, validating every present field before
/// returning so a bad field never results in a half-applied command.
pub fn decode_command(payload: &[u8], payloads: &Payloads) -> Result<Command, CommandError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| CommandError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(CommandError::NotAnObject);
    }
    let msg: CommandMessage =
        serde_json::from_value(value).map_err(|e| CommandError::Malformed(e.to_string()))?;

    let state = match msg.state {
        None => None,
        Some(tok) if tok == payloads.on => Some(true),
        Some(tok) if tok == payloads.off => Some(false),
        Some(tok) => return Err(CommandError::UnknownState(tok)),
    };
    if let Some(ml) = msg.volume
        && !(ml.is_finite() && ml >= 0.0)
    {
        return Err(CommandError::InvalidVolume(ml));
    }

    Ok(Command {
        state,
        volume_ml: msg.volume,
    })
}

impl DispenseStatus {
    pub fn to_message(&self, payloads: &Payloads) -> StatusMessage {
        StatusMessage {
            state: if self.is_on {
                payloads.on.clone()
            } else {
                payloads.off.clone()
            },
            volume_target: self.target_volume_ml,
            volume_current: self.current_volume_ml.unwrap_or(0.0),
        }
    }
}

pub fn encode_status(
    status: &DispenseStatus,
    payloads: &Payloads,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&status.to_message(payloads))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Payloads {
        Payloads::default()
    }

    #[test]
    fn decodes_both_fields() {
        let cmd = decode_command(br#"{"state":"ON","volume":120}"#, &p()).unwrap();
        assert_eq!(
            cmd,
            Command {
                state: Some(true),
                volume_ml: Some(120.0)
            }
        );
    }

    #[test]
    fn ignores_unknown_fields_and_nulls() {
        let cmd = decode_command(br#"{"state":null,"brightness":3}"#, &p()).unwrap();
        assert_eq!(cmd, Command::default());
    }

    #[test]
    fn array_payload_is_not_an_object() {
        // serde would happily map a sequence onto the struct; we don't allow it
        let err = decode_command(br#"["ON", 120]"#, &p()).unwrap_err();
        assert_eq!(err, CommandError::NotAnObject);
    }

    #[test]
    fn custom_tokens() {
        let payloads = Payloads {
            on: "1".into(),
            off: "0".into(),
            ..Payloads::default()
        };
        let cmd = decode_command(br#"{"state":"0"}"#, &payloads).unwrap();
        assert_eq!(cmd.state, Some(false));
        assert!(matches!(
            decode_command(br#"{"state":"ON"}"#, &payloads),
            Err(CommandError::UnknownState(_))
        ));
    }

    #[test]
    fn status_sentinel_encodes_as_zero() {
        let status = DispenseStatus {
            is_on: false,
            target_volume_ml: 120.0,
            current_volume_ml: None,
        };
        let bytes = encode_status(&status, &p()).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["state"], "OFF");
        assert_eq!(obj["volumeTarget"].as_f64(), Some(120.0));
        assert_eq!(obj["volumeCurrent"].as_f64(), Some(0.0));
    }
}
