//! Runtime configuration types for the controller and station loop.
//!
//! These are separate from the TOML-deserialized config in `waterer_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// Topic names used on the publish/subscribe link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Retained three-field status.
    pub state: String,
    /// Subscribed command topic.
    pub set: String,
    /// Retained `online`/`offline` flag, also the last-will topic.
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

/// Payload tokens for on/off state and availability.
#[derive(Debug, Clone, PartialEq, Eq)]
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

/// Dose controller tuning.
#[derive(Debug, Clone)]
pub struct ControlCfg {
    /// Status publish period while dispensing (ms).
    pub status_interval_ms: u64,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            status_interval_ms: 100,
        }
    }
}

/// Broker session parameters and reconnect policy.
#[derive(Debug, Clone)]
pub struct LinkCfg {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Fixed delay between failed connect attempts (ms).
    pub reconnect_delay_ms: u64,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "ESP_Watering".into(),
            username: None,
            password: None,
            reconnect_delay_ms: 5_000,
        }
    }
}

/// Everything the station loop needs besides the controller and transport.
#[derive(Debug, Clone)]
pub struct StationCfg {
    pub topics: Topics,
    pub payloads: Payloads,
    pub link: LinkCfg,
    /// Pause between loop iterations (ms).
    pub loop_interval_ms: u64,
}

impl Default for StationCfg {
    fn default() -> Self {
        Self {
            topics: Topics::default(),
            payloads: Payloads::default(),
            link: LinkCfg::default(),
            loop_interval_ms: 10,
        }
    }
}

impl StationCfg {
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.link.reconnect_delay_ms)
    }
}
