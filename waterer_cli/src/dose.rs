//! Hardware assembly, config mapping, and the `run`/`dose` entry points.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use tracing::info;
use waterer_config::{Calibration, Config};
use waterer_core::error::{Result as CoreResult, WatererError};
use waterer_core::{
    ControlCfg, DispenseRequest, DoseController, DoseEvent, FlowCalibration, Station, StationCfg,
};
use waterer_hardware::{SimulatedFlowMeter, SimulatedPump};
use waterer_traits::{FlowMeter, Pump};

use crate::stdio::StdioTransport;

/// Overrides `simulation.pulses_per_tick`; handy for tests that want a fast sim.
pub const SIM_PULSES_ENV: &str = "WATERER_SIM_PULSES";

pub type Hardware = (Box<dyn Pump>, Box<dyn FlowMeter>);

/// Whether this binary can drive real GPIO at all.
pub const fn hardware_available() -> bool {
    cfg!(all(feature = "hardware", target_os = "linux"))
}

fn sim_pulses(cfg: &Config) -> u32 {
    std::env::var(SIM_PULSES_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(cfg.simulation.pulses_per_tick)
}

pub fn make_hardware(cfg: &Config, simulate: bool) -> CoreResult<Hardware> {
    if !simulate && hardware_available() {
        return open_gpio(cfg);
    }
    let pulses = sim_pulses(cfg);
    info!(pulses_per_tick = pulses, "using simulated pump and flow meter");
    let pump = SimulatedPump::new();
    let meter = SimulatedFlowMeter::coupled(&pump, pulses);
    Ok((Box::new(pump), Box::new(meter)))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_gpio(cfg: &Config) -> CoreResult<Hardware> {
    let pump = waterer_hardware::GpioPump::new(cfg.pins.pump)
        .map_err(|e| eyre::Report::new(WatererError::HardwareFault(e.to_string())))
        .wrap_err("open pump pin")?;
    let meter = waterer_hardware::GpioFlowMeter::new(cfg.pins.flow_meter)
        .map_err(|e| eyre::Report::new(WatererError::HardwareFault(e.to_string())))
        .wrap_err("open flow meter pin")?;
    info!(
        pump_pin = cfg.pins.pump,
        flow_pin = cfg.pins.flow_meter,
        "GPIO ready"
    );
    Ok((Box::new(pump), Box::new(meter)))
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_gpio(_cfg: &Config) -> CoreResult<Hardware> {
    Err(eyre::Report::new(WatererError::HardwareFault(
        "built without the `hardware` feature".into(),
    )))
}

pub fn build_controller(
    cfg: &Config,
    calib: Option<&Calibration>,
    hw: Hardware,
    request: DispenseRequest,
) -> CoreResult<DoseController> {
    let calibration: FlowCalibration = match calib {
        Some(c) => c.into(),
        None => (&cfg.flow_meter).into(),
    };
    let control: ControlCfg = (&cfg.mqtt).into();
    let (pump, meter) = hw;
    DoseController::builder()
        .with_pump(pump)
        .with_flow_meter(meter)
        .with_calibration(calibration)
        .with_control(control)
        .with_request(request)
        .build()
}

/// `run`: the station over stdin/stdout until input ends and the controller
/// is idle, or until Ctrl-C.
pub fn run_station(
    cfg: &Config,
    calib: Option<&Calibration>,
    simulate: bool,
    shutdown: &Arc<AtomicBool>,
) -> CoreResult<()> {
    let hw = make_hardware(cfg, simulate)?;
    let controller = build_controller(cfg, calib, hw, DispenseRequest::default())?;
    let station_cfg: StationCfg = cfg.into();
    let transport = StdioTransport::spawn(
        std::io::BufReader::new(std::io::stdin()),
        std::io::stdout(),
        station_cfg.topics.set.clone(),
    )
    .wrap_err("start stdin reader")?;

    let mut station = Station::new(controller, transport, station_cfg);
    station.run_until(shutdown, |s| {
        s.transport().finished() && s.controller().is_idle()
    })?;

    if shutdown.load(Ordering::Relaxed) {
        return Err(eyre::Report::new(WatererError::Interrupted));
    }
    Ok(())
}

/// `dose --ml`: one local dose. Returns the dispensed volume.
pub fn run_dose(
    cfg: &Config,
    calib: Option<&Calibration>,
    ml: f32,
    simulate: bool,
    shutdown: &Arc<AtomicBool>,
) -> CoreResult<f32> {
    if !(ml.is_finite() && ml >= 0.0) {
        return Err(eyre::Report::new(WatererError::Config(format!(
            "--ml must be a finite value >= 0, got {ml}"
        ))));
    }
    let hw = make_hardware(cfg, simulate)?;
    let mut controller = build_controller(
        cfg,
        calib,
        hw,
        DispenseRequest {
            requested_on: true,
            target_volume_ml: ml,
        },
    )?;
    let interval = Duration::from_millis(cfg.runner.loop_interval_ms);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            controller.shutdown()?;
            return Err(eyre::Report::new(WatererError::Interrupted));
        }
        match controller.step() {
            Ok(DoseEvent::Finished { dispensed_ml, .. }) => return Ok(dispensed_ml),
            Ok(_) => {}
            Err(e) => {
                // never leave the pump running on the way out
                let _ = controller.shutdown();
                return Err(e);
            }
        }
        controller.clock().sleep(interval);
    }
}

/// Name used for `abort_reason` in JSON output.
pub fn abort_reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<WatererError>() {
        Some(WatererError::Interrupted) => "Interrupted",
        Some(WatererError::Hardware(_) | WatererError::HardwareFault(_)) => "Hardware",
        Some(WatererError::Config(_)) => "Config",
        Some(WatererError::Transport(_)) => "Transport",
        Some(WatererError::Protocol(_)) => "Protocol",
        None => "Error",
    }
}
