//! Publish/subscribe link seam.
//!
//! The controller only needs a handful of MQTT-shaped operations: connect
//! with a last will, publish (optionally retained), subscribe, and poll for
//! inbound messages. Reconnect policy lives with the caller, not here.

use crate::BoxError;

/// An inbound message delivered on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message the broker publishes on our behalf after an unclean disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Everything needed to open a session with the broker.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub last_will: Option<LastWill>,
}

pub trait Transport {
    fn connect(&mut self, opts: &ConnectOptions) -> Result<(), BoxError>;
    fn is_connected(&self) -> bool;
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BoxError>;
    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError>;
    /// Service the link and return the next pending inbound message, if any.
    /// An error means the link is gone and must be re-established.
    fn poll(&mut self) -> Result<Option<Message>, BoxError>;
    fn disconnect(&mut self) -> Result<(), BoxError>;
}
