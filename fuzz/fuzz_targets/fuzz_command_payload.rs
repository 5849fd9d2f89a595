#![no_main]
use libfuzzer_sys::fuzz_target;
use waterer_core::{CommandHandler, DispenseRequest, Payloads};

fuzz_target!(|data: &[u8]| {
    let handler = CommandHandler::new(Payloads::default());
    let before = DispenseRequest {
        requested_on: true,
        target_volume_ml: 42.0,
    };
    let mut req = before;
    match handler.handle(data, &mut req) {
        Ok(_) => {
            assert!(req.target_volume_ml.is_finite() && req.target_volume_ml >= 0.0);
        }
        // a rejected payload must leave the request untouched
        Err(_) => assert_eq!(req, before),
    }
});
