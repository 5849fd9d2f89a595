use tracing::{debug, warn};

use crate::config::Payloads;
use crate::error::CommandError;
use crate::protocol::{Command, DispenseRequest, decode_command};

/// Applies inbound command payloads to the dispense request.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    payloads: Payloads,
}

impl CommandHandler {
    pub fn new(payloads: Payloads) -> Self {
        Self { payloads }
    }

    /// Decode `payload` and apply it to `request`.
    ///
    /// On failure the request is left exactly as it was and the rejection is
    /// logged here; callers only decide whether to publish.
    pub fn handle(
        &self,
        payload: &[u8],
        request: &mut DispenseRequest,
    ) -> Result<Command, CommandError> {
        match decode_command(payload, &self.payloads) {
            Ok(cmd) => {
                cmd.apply(request);
                debug!(
                    state = ?cmd.state,
                    volume_ml = ?cmd.volume_ml,
                    requested_on = request.requested_on,
                    target_ml = request.target_volume_ml,
                    "command applied"
                );
                Ok(cmd)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "command rejected"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(on: bool, ml: f32) -> DispenseRequest {
        DispenseRequest {
            requested_on: on,
            target_volume_ml: ml,
        }
    }

    #[test]
    fn state_only_keeps_volume() {
        let h = CommandHandler::new(Payloads::default());
        let mut r = req(false, 250.0);
        h.handle(br#"{"state":"ON"}"#, &mut r).unwrap();
        assert_eq!(r, req(true, 250.0));
    }

    #[test]
    fn volume_only_keeps_state() {
        let h = CommandHandler::new(Payloads::default());
        let mut r = req(true, 250.0);
        h.handle(br#"{"volume":80.5}"#, &mut r).unwrap();
        assert_eq!(r, req(true, 80.5));
    }

    #[test]
    fn bad_field_rejects_the_whole_payload() {
        let h = CommandHandler::new(Payloads::default());
        let mut r = req(false, 250.0);
        // valid state but invalid volume: nothing may be applied
        let err = h
            .handle(br#"{"state":"ON","volume":-3}"#, &mut r)
            .unwrap_err();
        assert_eq!(err, CommandError::InvalidVolume(-3.0));
        assert_eq!(r, req(false, 250.0));
    }
}
