//! Status and availability publishing.

use eyre::WrapErr;
use tracing::trace;
use waterer_traits::{LastWill, Transport};

use crate::config::{Payloads, Topics};
use crate::error::{Result, WatererError};
use crate::hw_error::map_transport_error;
use crate::protocol::{DispenseStatus, encode_status};

#[derive(Debug, Clone)]
pub struct StatusReporter {
    topics: Topics,
    payloads: Payloads,
}

impl StatusReporter {
    pub fn new(topics: Topics, payloads: Payloads) -> Self {
        Self { topics, payloads }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn payloads(&self) -> &Payloads {
        &self.payloads
    }

    /// Retained `offline` on the availability topic.
    pub fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.topics.availability.clone(),
            payload: self.payloads.offline.as_bytes().to_vec(),
            retain: true,
        }
    }

    /// Publish the three-field status, retained.
    pub fn publish_status<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        status: &DispenseStatus,
    ) -> Result<()> {
        let body = encode_status(status, &self.payloads)
            .map_err(|e| eyre::Report::new(WatererError::Protocol(e.to_string())))?;
        trace!(topic = %self.topics.state, payload = %String::from_utf8_lossy(&body), "publish status");
        transport
            .publish(&self.topics.state, &body, true)
            .map_err(|e| eyre::Report::new(map_transport_error(&*e)))
            .wrap_err("publish status")
    }

    /// Run right after a (re)connect: mark online, push the current status,
    /// then subscribe to the command topic.
    pub fn announce<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        status: &DispenseStatus,
    ) -> Result<()> {
        self.publish_availability(transport, &self.payloads.online)?;
        self.publish_status(transport, status)?;
        transport
            .subscribe(&self.topics.set)
            .map_err(|e| eyre::Report::new(map_transport_error(&*e)))
            .wrap_err("subscribe")
    }

    /// Graceful counterpart of the last will.
    pub fn announce_offline<T: Transport + ?Sized>(&self, transport: &mut T) -> Result<()> {
        self.publish_availability(transport, &self.payloads.offline)
    }

    fn publish_availability<T: Transport + ?Sized>(
        &self,
        transport: &mut T,
        payload: &str,
    ) -> Result<()> {
        transport
            .publish(&self.topics.availability, payload.as_bytes(), true)
            .map_err(|e| eyre::Report::new(map_transport_error(&*e)))
            .wrap_err("publish availability")
    }
}
