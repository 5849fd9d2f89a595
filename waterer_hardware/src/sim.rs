//! Simulated pump and flow meter for running without a flow meter attached.
//!
//! The simulated meter is coupled to a simulated pump. Water flows between
//! polls: each poll while the pump runs and counting is armed first reports
//! the edges accumulated since the previous poll, then injects
//! `pulses_per_poll` more through the same `PulseCounter::on_edge` path a
//! real interrupt would use. The first poll after arming therefore sees 0.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use waterer_traits::{BoxError, FlowMeter, Pump};

use crate::pulse::PulseCounter;

/// Simulated solenoid pump; only tracks whether it is running.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPump {
    running: Arc<AtomicBool>,
}

impl SimulatedPump {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Pump for SimulatedPump {
    fn start(&mut self) -> Result<(), BoxError> {
        self.running.store(true, Ordering::Relaxed);
        tracing::debug!("pump on (simulated)");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!("pump off (simulated)");
        Ok(())
    }
}

/// Simulated flow meter producing pulses while its coupled pump runs.
#[derive(Debug, Clone)]
pub struct SimulatedFlowMeter {
    counter: PulseCounter,
    pump_running: Arc<AtomicBool>,
    pulses_per_poll: u32,
}

impl SimulatedFlowMeter {
    /// Couple a meter to `pump`; water only "flows" while that pump runs.
    pub fn coupled(pump: &SimulatedPump, pulses_per_poll: u32) -> Self {
        Self {
            counter: PulseCounter::new(),
            pump_running: pump.running.clone(),
            pulses_per_poll,
        }
    }

    pub fn counter(&self) -> &PulseCounter {
        &self.counter
    }
}

impl FlowMeter for SimulatedFlowMeter {
    fn begin_counting(&mut self) -> Result<(), BoxError> {
        self.counter.arm();
        Ok(())
    }

    fn end_counting(&mut self) -> Result<(), BoxError> {
        self.counter.disarm();
        Ok(())
    }

    fn pulses(&mut self) -> u32 {
        let n = self.counter.count();
        if self.pump_running.load(Ordering::Relaxed) {
            for _ in 0..self.pulses_per_poll {
                self.counter.on_edge();
            }
        }
        tracing::trace!(pulses = n, "flow meter poll (simulated)");
        n
    }
}
