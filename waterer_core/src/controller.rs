//! Two-state dose controller and its type-state builder.
//!
//! The controller owns the pump and the flow meter's counting lifecycle.
//! Remote commands only ever touch the [`DispenseRequest`]; `step()` reconciles
//! the physical state with it.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use tracing::{debug, info, warn};
use waterer_traits::clock::{Clock, MonotonicClock};
use waterer_traits::{FlowMeter, Pump};

use crate::config::ControlCfg;
use crate::error::{BuildError, Result};
use crate::flow::FlowCalibration;
use crate::hw_error::map_hw_error;
use crate::protocol::{DispenseRequest, DispenseStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoseState {
    /// Pump off, flow meter not counting.
    Idle,
    /// Pump on, flow meter counting. Times are ms since the controller epoch.
    Dispensing { since_ms: u64, last_report_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    Cancelled,
}

/// Outcome of one `step()`. Variants carrying a status should be published.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DoseEvent {
    Idle,
    Running,
    Started(DispenseStatus),
    Progress(DispenseStatus),
    Finished {
        reason: StopReason,
        dispensed_ml: f32,
        status: DispenseStatus,
    },
}

impl DoseEvent {
    /// Status to publish for this event, if any.
    pub fn status(&self) -> Option<&DispenseStatus> {
        match self {
            DoseEvent::Started(s) | DoseEvent::Progress(s) => Some(s),
            DoseEvent::Finished { status, .. } => Some(status),
            DoseEvent::Idle | DoseEvent::Running => None,
        }
    }
}

pub struct DoseController {
    pump: Box<dyn Pump>,
    flow_meter: Box<dyn FlowMeter>,
    calibration: FlowCalibration,
    control: ControlCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    request: DispenseRequest,
    state: DoseState,
    last_pulses: u32,
}

impl core::fmt::Debug for DoseController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DoseController")
            .field("request", &self.request)
            .field("state", &self.state)
            .field("last_pulses", &self.last_pulses)
            .field("pulses_per_liter", &self.calibration.pulses_per_liter)
            .finish()
    }
}

impl DoseController {
    pub fn builder() -> DoseControllerBuilder<Missing, Missing> {
        DoseControllerBuilder::default()
    }

    pub fn request(&self) -> &DispenseRequest {
        &self.request
    }

    /// Mutable access for the command handler. Takes effect on the next `step()`.
    pub fn request_mut(&mut self) -> &mut DispenseRequest {
        &mut self.request
    }

    pub fn state(&self) -> DoseState {
        self.state
    }

    /// Idle with nothing requested; a pending ON is not idle.
    pub fn is_idle(&self) -> bool {
        self.state == DoseState::Idle && !self.request.requested_on
    }

    /// Volume dispensed so far in the running dose, `None` while idle.
    pub fn current_volume_ml(&self) -> Option<f32> {
        match self.state {
            DoseState::Dispensing { .. } => Some(self.calibration.volume_ml(self.last_pulses)),
            DoseState::Idle => None,
        }
    }

    pub fn status(&self) -> DispenseStatus {
        DispenseStatus {
            is_on: self.request.requested_on,
            target_volume_ml: self.request.target_volume_ml,
            current_volume_ml: self.current_volume_ml(),
        }
    }

    pub fn calibration(&self) -> &FlowCalibration {
        &self.calibration
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Advance the state machine by one iteration.
    pub fn step(&mut self) -> Result<DoseEvent> {
        let now = self.clock.ms_since(self.epoch);
        match self.state {
            DoseState::Idle if self.request.requested_on => self.start(now),
            DoseState::Idle => Ok(DoseEvent::Idle),
            DoseState::Dispensing {
                since_ms,
                last_report_ms,
            } => {
                self.last_pulses = self.flow_meter.pulses();
                let volume = self.calibration.volume_ml(self.last_pulses);
                let elapsed_ms = now.saturating_sub(since_ms);

                if !self.request.requested_on {
                    return self.finish(StopReason::Cancelled, volume, elapsed_ms);
                }
                if volume >= self.request.target_volume_ml {
                    return self.finish(StopReason::TargetReached, volume, elapsed_ms);
                }
                if now.saturating_sub(last_report_ms) >= self.control.status_interval_ms {
                    self.state = DoseState::Dispensing {
                        since_ms,
                        last_report_ms: now,
                    };
                    debug!(pulses = self.last_pulses, volume_ml = volume, "dose progress");
                    return Ok(DoseEvent::Progress(self.status()));
                }
                Ok(DoseEvent::Running)
            }
        }
    }

    /// Stop the pump if a dose is running. Safe to call repeatedly.
    pub fn shutdown(&mut self) -> Result<()> {
        if let DoseState::Dispensing { .. } = self.state {
            self.stop_pump()?;
            self.state = DoseState::Idle;
            self.detach_after_stop();
            info!(pulses = self.last_pulses, "pump stopped on shutdown");
        }
        Ok(())
    }

    fn start(&mut self, now: u64) -> Result<DoseEvent> {
        self.flow_meter
            .begin_counting()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("attach flow meter")?;
        if let Err(e) = self.pump.start() {
            // pump never came on; leave the meter detached too
            let _ = self.flow_meter.end_counting();
            return Err(eyre::Report::new(map_hw_error(&*e)).wrap_err("start pump"));
        }
        self.last_pulses = 0;
        self.state = DoseState::Dispensing {
            since_ms: now,
            last_report_ms: now,
        };
        info!(target_ml = self.request.target_volume_ml, "dose started");
        Ok(DoseEvent::Started(self.status()))
    }

    fn finish(
        &mut self,
        reason: StopReason,
        dispensed_ml: f32,
        elapsed_ms: u64,
    ) -> Result<DoseEvent> {
        // pump first: if this fails we stay Dispensing and retry next step
        self.stop_pump()?;
        self.state = DoseState::Idle;
        if reason == StopReason::TargetReached {
            self.request.requested_on = false;
        }
        self.detach_after_stop();
        info!(
            ?reason,
            dispensed_ml,
            target_ml = self.request.target_volume_ml,
            pulses = self.last_pulses,
            elapsed_ms,
            "dose finished"
        );
        Ok(DoseEvent::Finished {
            reason,
            dispensed_ml,
            status: self.status(),
        })
    }

    fn stop_pump(&mut self) -> Result<()> {
        self.pump
            .stop()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("stop pump")
    }

    // The pump is already off, so the dose is over either way; a meter that
    // fails to detach is re-armed by the next begin_counting.
    fn detach_after_stop(&mut self) {
        if let Err(e) = self.flow_meter.end_counting() {
            let e = eyre::Report::new(map_hw_error(&*e)).wrap_err("detach flow meter");
            warn!(error = %format!("{e:#}"), "flow meter detach failed");
        }
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `DoseController`. `build()` only exists once both a pump and
/// a flow meter are set; `try_build()` works in any state.
pub struct DoseControllerBuilder<P, F> {
    pump: Option<Box<dyn Pump>>,
    flow_meter: Option<Box<dyn FlowMeter>>,
    calibration: Option<FlowCalibration>,
    control: Option<ControlCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    request: Option<DispenseRequest>,
    _p: PhantomData<P>,
    _f: PhantomData<F>,
}

impl Default for DoseControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            pump: None,
            flow_meter: None,
            calibration: None,
            control: None,
            clock: None,
            request: None,
            _p: PhantomData,
            _f: PhantomData,
        }
    }
}

impl<P, F> DoseControllerBuilder<P, F> {
    pub fn with_calibration(mut self, calibration: FlowCalibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Initial request; defaults to off with a zero target.
    pub fn with_request(mut self, request: DispenseRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn try_build(self) -> Result<DoseController> {
        let pump = self
            .pump
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPump))?;
        let flow_meter = self
            .flow_meter
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFlowMeter))?;

        let calibration = self.calibration.unwrap_or_default();
        if !calibration.is_valid() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "pulses_per_liter must be finite and > 0",
            )));
        }
        let control = self.control.unwrap_or_default();
        if control.status_interval_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "status_interval_ms must be > 0",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        Ok(DoseController {
            pump,
            flow_meter,
            calibration,
            control,
            clock,
            epoch,
            request: self.request.unwrap_or_default(),
            state: DoseState::Idle,
            last_pulses: 0,
        })
    }

    fn retype<P2, F2>(self) -> DoseControllerBuilder<P2, F2> {
        DoseControllerBuilder {
            pump: self.pump,
            flow_meter: self.flow_meter,
            calibration: self.calibration,
            control: self.control,
            clock: self.clock,
            request: self.request,
            _p: PhantomData,
            _f: PhantomData,
        }
    }
}

// Setters that advance type-state
impl<F> DoseControllerBuilder<Missing, F> {
    pub fn with_pump(mut self, pump: impl Pump + 'static) -> DoseControllerBuilder<Set, F> {
        self.pump = Some(Box::new(pump));
        self.retype()
    }
}

impl<P> DoseControllerBuilder<P, Missing> {
    pub fn with_flow_meter(
        mut self,
        flow_meter: impl FlowMeter + 'static,
    ) -> DoseControllerBuilder<P, Set> {
        self.flow_meter = Some(Box::new(flow_meter));
        self.retype()
    }
}

impl DoseControllerBuilder<Set, Set> {
    /// Infallible on missing parts; still validates calibration and intervals.
    pub fn build(self) -> Result<DoseController> {
        self.try_build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockFlowMeter, MockPump};
    use std::time::Duration;
    use waterer_traits::clock::test_clock::TestClock;

    fn controller(clock: &TestClock) -> (DoseController, MockPump, MockFlowMeter) {
        let pump = MockPump::new();
        let meter = MockFlowMeter::new();
        let c = DoseController::builder()
            .with_pump(pump.clone())
            .with_flow_meter(meter.clone())
            .with_calibration(FlowCalibration::new(1000.0))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (c, pump, meter)
    }

    #[test]
    fn progress_respects_interval() {
        let clock = TestClock::new();
        let (mut c, _pump, meter) = controller(&clock);
        *c.request_mut() = DispenseRequest {
            requested_on: true,
            target_volume_ml: 500.0,
        };
        assert!(matches!(c.step().unwrap(), DoseEvent::Started(_)));

        meter.add_pulses(10);
        clock.advance(Duration::from_millis(50));
        assert_eq!(c.step().unwrap(), DoseEvent::Running);

        clock.advance(Duration::from_millis(50));
        match c.step().unwrap() {
            DoseEvent::Progress(s) => assert_eq!(s.current_volume_ml, Some(10.0)),
            other => panic!("unexpected: {other:?}"),
        }
        // report time reset
        assert_eq!(c.step().unwrap(), DoseEvent::Running);
    }

    #[test]
    fn failed_stop_keeps_dispensing() {
        let clock = TestClock::new();
        let (mut c, pump, meter) = controller(&clock);
        c.request_mut().requested_on = true;
        c.request_mut().target_volume_ml = 5.0;
        c.step().unwrap();
        meter.add_pulses(5);

        pump.fail_stop(true);
        assert!(c.step().is_err());
        assert!(matches!(c.state(), DoseState::Dispensing { .. }));
        assert!(pump.is_running());

        pump.fail_stop(false);
        assert!(matches!(c.step().unwrap(), DoseEvent::Finished { .. }));
        assert!(!pump.is_running());
        assert!(!meter.is_counting());
    }

    #[test]
    fn failed_start_leaves_meter_detached() {
        let clock = TestClock::new();
        let (mut c, pump, meter) = controller(&clock);
        c.request_mut().requested_on = true;
        pump.fail_start(true);
        assert!(c.step().is_err());
        assert_eq!(c.state(), DoseState::Idle);
        assert!(!meter.is_counting());
    }
}
