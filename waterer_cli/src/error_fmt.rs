//! Human-readable error descriptions and structured JSON error formatting.

use crate::dose::abort_reason_name;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use waterer_core::error::{BuildError, WatererError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPump => {
                "What happened: No pump was provided to the controller.\nLikely causes: The pump output failed to initialize or was not wired into the builder.\nHow to fix: Ensure the pump is created successfully and passed via with_pump(...).".to_string()
            }
            BuildError::MissingFlowMeter => {
                "What happened: No flow meter was provided to the controller.\nLikely causes: The flow meter input failed to initialize or was not wired into the builder.\nHow to fix: Ensure the flow meter is created successfully and passed via with_flow_meter(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(we) = err.downcast_ref::<WatererError>() {
        return match we {
            WatererError::Interrupted => {
                "What happened: Interrupted; the pump was switched off.".to_string()
            }
            WatererError::Hardware(msg) | WatererError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong pump/flow meter pin numbers, wiring, or missing GPIO permissions.\nHow to fix: Check [pins] in the config and that the process may access GPIO, or rerun with --simulate."
            ),
            WatererError::Config(msg) if msg.contains("must have headers") => {
                "Invalid headers in calibration CSV. Expected 'pulses,ml'.".to_string()
            }
            WatererError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing [pins] or [mqtt], or out-of-range values.\nHow to fix: Edit the TOML config and try again."
            ),
            WatererError::Transport(msg) => format!(
                "What happened: Link error ({msg}).\nLikely causes: Broker unreachable or the output stream was closed.\nHow to fix: Check [mqtt] host/port and credentials."
            ),
            WatererError::Protocol(msg) => format!(
                "What happened: Protocol error ({msg}).\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Exit codes: 2 interrupted, 3 hardware, 4 configuration, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use waterer_core::error::{BuildError, WatererError};

    match err.downcast_ref::<WatererError>() {
        Some(WatererError::Interrupted) => return 2,
        Some(WatererError::Hardware(_) | WatererError::HardwareFault(_)) => return 3,
        Some(WatererError::Config(_)) => return 4,
        _ => {}
    }
    if let Some(BuildError::InvalidConfig(_)) = err.downcast_ref::<BuildError>() {
        return 4;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": abort_reason_name(err),
        "message": humanize(err),
        "exit_code": exit_code_for_error(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterer_core::error::WatererError;

    #[test]
    fn exit_codes() {
        let r = |e: WatererError| eyre::Report::new(e);
        assert_eq!(exit_code_for_error(&r(WatererError::Interrupted)), 2);
        assert_eq!(
            exit_code_for_error(&r(WatererError::HardwareFault("x".into()))),
            3
        );
        assert_eq!(exit_code_for_error(&r(WatererError::Config("x".into()))), 4);
        assert_eq!(
            exit_code_for_error(&r(WatererError::Transport("x".into()))),
            1
        );
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn context_does_not_hide_the_kind() {
        let e = eyre::Report::new(WatererError::Config("bad".into())).wrap_err("load config");
        assert_eq!(exit_code_for_error(&e), 4);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "Config");
    }
}
