//! Maps `Box<dyn Error>` from trait boundaries to typed `WatererError`.
//!
//! The traits in `waterer_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `waterer_hardware::HwError` downcasting.

use crate::error::WatererError;

/// Map a pump/flow-meter error to a typed `WatererError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> WatererError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<waterer_hardware::error::HwError>() {
            return WatererError::HardwareFault(hw.to_string());
        }
    }
    WatererError::Hardware(e.to_string())
}

/// Map a transport error. Transport failures are never hardware faults.
pub fn map_transport_error(e: &(dyn std::error::Error + 'static)) -> WatererError {
    WatererError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_map_to_hardware() {
        let e: Box<dyn std::error::Error + Send + Sync> = "relay stuck".into();
        match map_hw_error(&*e) {
            WatererError::Hardware(msg) => assert_eq!(msg, "relay stuck"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_errors_map_to_fault() {
        let e: Box<dyn std::error::Error + Send + Sync> =
            Box::new(waterer_hardware::error::HwError::Gpio("pin 4 busy".into()));
        match map_hw_error(&*e) {
            WatererError::HardwareFault(msg) => assert!(msg.contains("pin 4 busy")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
