#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core watering logic (hardware-agnostic).
//!
//! All hardware goes through `waterer_traits::Pump` and
//! `waterer_traits::FlowMeter`; the broker link goes through
//! `waterer_traits::Transport`.
//!
//! ## Architecture
//!
//! - **Controller**: Idle/Dispensing state machine (`controller` module)
//! - **Protocol**: three-field status and two-field command JSON (`protocol`)
//! - **Command handling**: partial updates of the dispense request (`command`)
//! - **Reporting**: status, availability and last will (`reporter`)
//! - **Station**: connect/retry, command drain and publish loop (`station`)
//!
//! Volume is always derived from the pulse count on the loop side:
//! `volume_ml = pulses * 1000 / pulses_per_liter`.

pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod flow;
pub mod hw_error;
pub mod mocks;
pub mod protocol;
pub mod reporter;
pub mod station;
pub mod transport;

pub use command::CommandHandler;
pub use config::{ControlCfg, LinkCfg, Payloads, StationCfg, Topics};
pub use controller::{
    DoseController, DoseControllerBuilder, DoseEvent, DoseState, Missing, Set, StopReason,
};
pub use error::{BuildError, CommandError, Report, Result, WatererError};
pub use flow::FlowCalibration;
pub use protocol::{Command, DispenseRequest, DispenseStatus, StatusMessage};
pub use reporter::StatusReporter;
pub use station::Station;
pub use transport::{MemoryTransport, Published};
