//! In-process broker double.
//!
//! Behaves like a single-client broker: keeps retained messages, delivers
//! injected messages only on subscribed topics, and publishes the last will
//! when the link is dropped uncleanly. Used by the station tests and by
//! anything that wants to drive the station without a network.

use std::collections::{HashMap, VecDeque};

use waterer_traits::{BoxError, ConnectOptions, Message, Transport};

/// One outbound publish as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("")
    }
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    connected: bool,
    failing_connects: u32,
    connect_attempts: u32,
    last_options: Option<ConnectOptions>,
    subscriptions: Vec<String>,
    inbox: VecDeque<Message>,
    published: Vec<Published>,
    retained: HashMap<String, Vec<u8>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `n` connect attempts.
    pub fn fail_next_connects(&mut self, n: u32) {
        self.failing_connects = n;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    pub fn last_options(&self) -> Option<&ConnectOptions> {
        self.last_options.as_ref()
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Deliver a message from another client. Returns false (and drops it)
    /// when we are not connected and subscribed to `topic`.
    pub fn inject(&mut self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        if !self.connected || !self.subscriptions.iter().any(|t| t == topic) {
            return false;
        }
        self.inbox.push_back(Message::new(topic, payload));
        true
    }

    /// Simulate the network going away. The broker fires the last will.
    pub fn drop_link(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        self.subscriptions.clear();
        self.inbox.clear();
        if let Some(will) = self.last_options.as_ref().and_then(|o| o.last_will.clone()) {
            self.record(&will.topic, &will.payload, will.retain);
        }
    }

    pub fn retained(&self, topic: &str) -> Option<&[u8]> {
        self.retained.get(topic).map(Vec::as_slice)
    }

    pub fn published(&self) -> &[Published] {
        &self.published
    }

    pub fn take_published(&mut self) -> Vec<Published> {
        std::mem::take(&mut self.published)
    }

    fn record(&mut self, topic: &str, payload: &[u8], retain: bool) {
        if retain {
            self.retained.insert(topic.to_owned(), payload.to_vec());
        }
        self.published.push(Published {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
            retain,
        });
    }

    fn ensure_up(&self) -> Result<(), BoxError> {
        if self.connected {
            Ok(())
        } else {
            Err("not connected".into())
        }
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, opts: &ConnectOptions) -> Result<(), BoxError> {
        self.connect_attempts += 1;
        if self.failing_connects > 0 {
            self.failing_connects -= 1;
            return Err(format!("connection to {}:{} refused", opts.host, opts.port).into());
        }
        self.connected = true;
        self.subscriptions.clear();
        self.last_options = Some(opts.clone());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BoxError> {
        self.ensure_up()?;
        self.record(topic, payload, retain);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BoxError> {
        self.ensure_up()?;
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_owned());
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Message>, BoxError> {
        self.ensure_up()?;
        Ok(self.inbox.pop_front())
    }

    fn disconnect(&mut self) -> Result<(), BoxError> {
        // clean disconnect: the broker discards the will
        self.connected = false;
        self.subscriptions.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterer_traits::LastWill;

    #[test]
    fn will_fires_only_on_unclean_drop() {
        let mut t = MemoryTransport::new();
        let opts = ConnectOptions {
            last_will: Some(LastWill {
                topic: "avail".into(),
                payload: b"offline".to_vec(),
                retain: true,
            }),
            ..ConnectOptions::default()
        };
        t.connect(&opts).unwrap();
        t.disconnect().unwrap();
        assert_eq!(t.retained("avail"), None);

        t.connect(&opts).unwrap();
        t.drop_link();
        assert_eq!(t.retained("avail"), Some(&b"offline"[..]));
        assert!(t.publish("x", b"y", false).is_err());
    }

    #[test]
    fn inject_requires_subscription() {
        let mut t = MemoryTransport::new();
        t.connect(&ConnectOptions::default()).unwrap();
        assert!(!t.inject("cmd", "{}"));
        t.subscribe("cmd").unwrap();
        assert!(t.inject("cmd", "{}"));
        assert_eq!(t.poll().unwrap(), Some(Message::new("cmd", "{}")));
        assert_eq!(t.poll().unwrap(), None);
    }
}
