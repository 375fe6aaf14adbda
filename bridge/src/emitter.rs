//! Outbound notifications towards the host.
//!
//! The engine pushes one [`InboundEvent`] per camera whose observable state
//! changed. Delivery is fire-and-forget: a failing sink is logged by the
//! caller and never retried.

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tokio::sync::broadcast;
use tracing::info;

/// A state update for one entity, as delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub device_id: String,
    pub entity_id: String,
    /// JSON encoded camera state.
    pub payload: Vec<u8>,
}

#[derive(Debug, ThisError)]
pub enum EmitError {
    /// Nobody is listening anymore.
    #[error("Event sink closed")]
    Closed,
    #[error("Event sink rejected the event: {0}")]
    Rejected(String),
}

/// Capability the host provides to receive events.
pub trait EventSink: Send + Sync {
    /// Hands `event` to the host. Must not block for long.
    ///
    /// # Errors
    ///
    /// Returns an error if the host could not accept the event.
    fn emit(&self, event: InboundEvent) -> Result<(), EmitError>;
}

/// Sink that only logs, for running without a host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: InboundEvent) -> Result<(), EmitError> {
        info!(
            device_id = %event.device_id,
            entity_id = %event.entity_id,
            payload = %String::from_utf8_lossy(&event.payload),
            "camera state event"
        );
        Ok(())
    }
}

/// Sink forwarding events to every subscriber of a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<InboundEvent>,
}

impl BroadcastSink {
    /// Creates a sink buffering at most `capacity` events per lagging subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<InboundEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: InboundEvent) -> Result<(), EmitError> {
        self.tx.send(event).map(drop).map_err(|_| EmitError::Closed)
    }
}
