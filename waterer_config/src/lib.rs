#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and flow-meter calibration parsing for the watering controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration CSV loader enforces headers and fits pulses-per-liter
//!   through the origin, with one outlier-rejecting refit.
use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// pulses,ml
///
/// Example:
/// pulses,ml
/// 289,100.0
/// 1444,500.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub pulses: u32,
    pub ml: f32,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Output driving the pump solenoid.
    pub pump: u8,
    /// Input wired to the flow meter pulse line.
    pub flow_meter: u8,
}

/// Network association is handled by the platform; these are carried for it.
#[derive(Debug, Deserialize)]
pub struct Wifi {
    pub ssid: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Mqtt {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Status publish period while dispensing (ms).
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Fixed delay between reconnect attempts (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "ESP_Watering".to_string()
}
fn default_update_interval_ms() -> u64 {
    100
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Topics {
    pub state: String,
    pub set: String,
    pub availability: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            state: "home-assistant/watering".into(),
            set: "home-assistant/watering/set".into(),
            availability: "home-assistant/watering/availability".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Payloads {
    pub on: String,
    pub off: String,
    pub online: String,
    pub offline: String,
}

impl Default for Payloads {
    fn default() -> Self {
        Self {
            on: "ON".into(),
            off: "OFF".into(),
            online: "online".into(),
            offline: "offline".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FlowMeterCfg {
    /// Pulses emitted by the meter per liter of water.
    pub pulses_per_liter: f32,
}

impl Default for FlowMeterCfg {
    fn default() -> Self {
        Self {
            // 1925 * 1.5 pulses/L for the stock sensor
            pulses_per_liter: 2887.5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
    /// Force debug-level console output regardless of `level`.
    pub debug: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Simulation {
    /// Use the simulated pump/flow meter even when built with hardware support.
    pub enabled: bool,
    /// Pulses injected per flow meter poll while the simulated pump runs.
    pub pulses_per_tick: u32,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            enabled: false,
            pulses_per_tick: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RunnerCfg {
    /// Pause between control loop iterations (ms).
    pub loop_interval_ms: u64,
}

impl Default for RunnerCfg {
    fn default() -> Self {
        Self {
            loop_interval_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub wifi: Option<Wifi>,
    pub mqtt: Mqtt,
    #[serde(default)]
    pub topics: Topics,
    #[serde(default)]
    pub payloads: Payloads,
    #[serde(default)]
    pub flow_meter: FlowMeterCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: Simulation,
    #[serde(default)]
    pub runner: RunnerCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub pulses_per_liter: f32,
}

impl Calibration {
    /// Fit `ml = k * pulses` by least squares through the origin and convert
    /// to pulses per liter (`1000 / k`).
    ///
    /// After the initial fit, rows whose residual exceeds 2x the RMS residual
    /// are dropped and the slope is refit once, provided at least one usable
    /// row remains.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        let pts: Vec<(f64, f64)> = rows
            .iter()
            .filter(|r| r.pulses > 0)
            .map(|r| (f64::from(r.pulses), f64::from(r.ml)))
            .collect();
        if pts.is_empty() {
            eyre::bail!("calibration requires at least one row with pulses > 0");
        }
        if rows.iter().any(|r| !r.ml.is_finite() || r.ml < 0.0) {
            eyre::bail!("calibration ml values must be finite and >= 0");
        }

        let k0 = fit_through_origin(&pts)?;
        let sumsq: f64 = pts
            .iter()
            .map(|(x, y)| {
                let r = y - k0 * x;
                r * r
            })
            .sum();
        let rms = (sumsq / pts.len() as f64).sqrt();

        let k = if rms.is_finite() && rms > 0.0 {
            let inliers: Vec<(f64, f64)> = pts
                .iter()
                .copied()
                .filter(|(x, y)| (y - k0 * x).abs() <= 2.0 * rms)
                .collect();
            if !inliers.is_empty() && inliers.len() < pts.len() {
                fit_through_origin(&inliers).unwrap_or(k0)
            } else {
                k0
            }
        } else {
            k0
        };

        let ppl = 1000.0 / k;
        if !ppl.is_finite() || ppl <= 0.0 {
            eyre::bail!("calibration produced invalid pulses per liter");
        }
        Ok(Calibration {
            pulses_per_liter: ppl as f32,
        })
    }
}

fn fit_through_origin(pts: &[(f64, f64)]) -> eyre::Result<f64> {
    let sxx: f64 = pts.iter().map(|(x, _)| x * x).sum();
    let sxy: f64 = pts.iter().map(|(x, y)| x * y).sum();
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("calibration cannot determine slope (no pulses recorded)");
    }
    let k = sxy / sxx;
    if !k.is_finite() || k <= 0.0 {
        eyre::bail!("calibration produced non-positive ml per pulse");
    }
    Ok(k)
}

impl TryFrom<Vec<CalibrationRow>> for Calibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["pulses", "ml"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'pulses,ml', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    Calibration::try_from(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if self.pins.pump == self.pins.flow_meter {
            eyre::bail!("pins.pump and pins.flow_meter must differ");
        }

        // Wifi
        if let Some(wifi) = &self.wifi
            && wifi.ssid.trim().is_empty()
        {
            eyre::bail!("wifi.ssid must not be empty");
        }

        // MQTT
        if self.mqtt.host.trim().is_empty() {
            eyre::bail!("mqtt.host must not be empty");
        }
        if self.mqtt.port == 0 {
            eyre::bail!("mqtt.port must be > 0");
        }
        if self.mqtt.client_id.trim().is_empty() {
            eyre::bail!("mqtt.client_id must not be empty");
        }
        if self.mqtt.update_interval_ms == 0 {
            eyre::bail!("mqtt.update_interval_ms must be >= 1");
        }
        if self.mqtt.reconnect_delay_ms == 0 {
            eyre::bail!("mqtt.reconnect_delay_ms must be >= 1");
        }

        // Topics
        for (name, t) in [
            ("topics.state", &self.topics.state),
            ("topics.set", &self.topics.set),
            ("topics.availability", &self.topics.availability),
        ] {
            if t.trim().is_empty() {
                eyre::bail!("{name} must not be empty");
            }
        }
        if self.topics.set == self.topics.state {
            eyre::bail!("topics.set must differ from topics.state");
        }

        // Payloads
        if self.payloads.on.is_empty() || self.payloads.off.is_empty() {
            eyre::bail!("payloads.on and payloads.off must not be empty");
        }
        if self.payloads.on == self.payloads.off {
            eyre::bail!("payloads.on and payloads.off must differ");
        }
        if self.payloads.online == self.payloads.offline {
            eyre::bail!("payloads.online and payloads.offline must differ");
        }

        // Flow meter
        let ppl = self.flow_meter.pulses_per_liter;
        if !ppl.is_finite() || ppl <= 0.0 {
            eyre::bail!("flow_meter.pulses_per_liter must be a finite value > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Runner
        if self.runner.loop_interval_ms == 0 {
            eyre::bail!("runner.loop_interval_ms must be >= 1");
        }

        Ok(())
    }
}
