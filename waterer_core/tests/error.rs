use std::sync::Arc;

use waterer_core::error::WatererError;
use waterer_core::mocks::{MockFlowMeter, MockPump};
use waterer_core::{DispenseRequest, DoseController, DoseState};
use waterer_hardware::error::HwError;
use waterer_traits::clock::test_clock::TestClock;
use waterer_traits::{BoxError, FlowMeter};

/// Flow meter whose interrupt can never be attached.
struct BrokenMeter;
impl FlowMeter for BrokenMeter {
    fn begin_counting(&mut self) -> Result<(), BoxError> {
        Err(Box::new(HwError::Interrupt("edge detection unavailable".into())))
    }
    fn end_counting(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
    fn pulses(&mut self) -> u32 {
        0
    }
}

fn on(target: f32) -> DispenseRequest {
    DispenseRequest {
        requested_on: true,
        target_volume_ml: target,
    }
}

#[test]
fn pump_error_surfaces_as_typed_hardware_error() {
    let pump = MockPump::new();
    pump.fail_start(true);
    let mut c = DoseController::builder()
        .with_pump(pump.clone())
        .with_flow_meter(MockFlowMeter::new())
        .with_request(on(100.0))
        .with_clock(Arc::new(TestClock::new()))
        .build()
        .expect("build");

    let err = c.step().expect_err("start must fail");
    let root = err.root_cause().to_string();
    assert!(root.contains("relay did not close"), "{root}");
    match err.downcast_ref::<WatererError>() {
        Some(WatererError::Hardware(_)) => {}
        other => panic!("expected Hardware, got {other:?}"),
    }
    assert!(format!("{err:#}").contains("start pump"));
    assert_eq!(c.state(), DoseState::Idle);
    assert!(!pump.is_running());
}

#[test]
fn hw_error_downcasts_to_fault() {
    let pump = MockPump::new();
    let mut c = DoseController::builder()
        .with_pump(pump.clone())
        .with_flow_meter(BrokenMeter)
        .with_request(on(100.0))
        .build()
        .expect("build");

    let err = c.step().expect_err("attach must fail");
    match err.downcast_ref::<WatererError>() {
        Some(WatererError::HardwareFault(msg)) => {
            assert!(msg.contains("edge detection unavailable"));
        }
        other => panic!("expected HardwareFault, got {other:?}"),
    }
    // the pump is never started when detection can't be armed
    assert_eq!(pump.starts(), 0);
}
