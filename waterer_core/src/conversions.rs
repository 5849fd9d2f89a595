//! `From` implementations bridging `waterer_config` types to `waterer_core` types.

use crate::config::{ControlCfg, LinkCfg, Payloads, StationCfg, Topics};
use crate::flow::FlowCalibration;

// ── Topics / Payloads ────────────────────────────────────────────────────────

impl From<&waterer_config::Topics> for Topics {
    fn from(c: &waterer_config::Topics) -> Self {
        Self {
            state: c.state.clone(),
            set: c.set.clone(),
            availability: c.availability.clone(),
        }
    }
}

impl From<&waterer_config::Payloads> for Payloads {
    fn from(c: &waterer_config::Payloads) -> Self {
        Self {
            on: c.on.clone(),
            off: c.off.clone(),
            online: c.online.clone(),
            offline: c.offline.clone(),
        }
    }
}

// ── MQTT section ─────────────────────────────────────────────────────────────

impl From<&waterer_config::Mqtt> for LinkCfg {
    fn from(c: &waterer_config::Mqtt) -> Self {
        Self {
            host: c.host.clone(),
            port: c.port,
            client_id: c.client_id.clone(),
            username: c.username.clone(),
            password: c.password.clone(),
            reconnect_delay_ms: c.reconnect_delay_ms,
        }
    }
}

impl From<&waterer_config::Mqtt> for ControlCfg {
    fn from(c: &waterer_config::Mqtt) -> Self {
        Self {
            status_interval_ms: c.update_interval_ms,
        }
    }
}

// ── Whole config ─────────────────────────────────────────────────────────────

impl From<&waterer_config::Config> for StationCfg {
    fn from(c: &waterer_config::Config) -> Self {
        Self {
            topics: (&c.topics).into(),
            payloads: (&c.payloads).into(),
            link: (&c.mqtt).into(),
            loop_interval_ms: c.runner.loop_interval_ms,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&waterer_config::FlowMeterCfg> for FlowCalibration {
    fn from(c: &waterer_config::FlowMeterCfg) -> Self {
        Self::new(c.pulses_per_liter)
    }
}

impl From<&waterer_config::Calibration> for FlowCalibration {
    fn from(c: &waterer_config::Calibration) -> Self {
        Self::new(c.pulses_per_liter)
    }
}
