use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WatererError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("dose interrupted")]
    Interrupted,
}

/// Why an inbound command payload was rejected. A rejected payload never
/// mutates the request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("malformed command payload: {0}")]
    Malformed(String),
    #[error("command payload must be a JSON object")]
    NotAnObject,
    #[error("unrecognized state token {0:?}")]
    UnknownState(String),
    #[error("invalid target volume {0}")]
    InvalidVolume(f32),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pump")]
    MissingPump,
    #[error("missing flow meter")]
    MissingFlowMeter,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
