//! Test and helper mocks for waterer_core.
//!
//! Both mocks are cheap `Clone` handles over shared state: hand one clone to
//! the controller and keep the other to drive or inspect it from the test.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use waterer_traits::{BoxError, FlowMeter, Pump};

#[derive(Debug, Clone, Default)]
pub struct MockPump {
    running: Arc<AtomicBool>,
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    fail_start: Arc<AtomicBool>,
    fail_stop: Arc<AtomicBool>,
}

impl MockPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::Relaxed)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::Relaxed)
    }

    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::Relaxed);
    }

    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::Relaxed);
    }
}

impl Pump for MockPump {
    fn start(&mut self) -> Result<(), BoxError> {
        if self.fail_start.load(Ordering::Relaxed) {
            return Err("pump relay did not close".into());
        }
        self.starts.fetch_add(1, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        if self.fail_stop.load(Ordering::Relaxed) {
            return Err("pump relay did not open".into());
        }
        self.stops.fetch_add(1, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }
}

/// Flow meter whose pulse count is set directly by the test.
#[derive(Debug, Clone, Default)]
pub struct MockFlowMeter {
    pulses: Arc<AtomicU32>,
    counting: Arc<AtomicBool>,
    fail_end: Arc<AtomicBool>,
}

impl MockFlowMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate `n` more edges. Ignored unless counting.
    pub fn add_pulses(&self, n: u32) {
        if self.is_counting() {
            self.pulses.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn set_pulses(&self, n: u32) {
        self.pulses.store(n, Ordering::Relaxed);
    }

    pub fn is_counting(&self) -> bool {
        self.counting.load(Ordering::Relaxed)
    }

    pub fn fail_end(&self, fail: bool) {
        self.fail_end.store(fail, Ordering::Relaxed);
    }
}

impl FlowMeter for MockFlowMeter {
    fn begin_counting(&mut self) -> Result<(), BoxError> {
        self.pulses.store(0, Ordering::Relaxed);
        self.counting.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn end_counting(&mut self) -> Result<(), BoxError> {
        if self.fail_end.load(Ordering::Relaxed) {
            return Err("flow meter interrupt stuck".into());
        }
        self.counting.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn pulses(&mut self) -> u32 {
        self.pulses.load(Ordering::Relaxed)
    }
}
