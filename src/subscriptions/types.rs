//! Subscription types for routed deltas.

use crate::delta::Delta;
use crate::types::SubscriptionId;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered events before the subscriber is dropped.
    /// Values below 1 are treated as 1. Default: 1000
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 1000 }
    }
}

/// Events emitted to a subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    /// A delta routed to one of this subscription's items.
    Delta { delta: Delta },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Client disconnected.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Handle to receive a subscription's events.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SubscriptionEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SubscriptionEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SubscriptionEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SubscriptionEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<SubscriptionEvent> {
        self.receiver.try_iter().collect()
    }

    /// Drain buffered deltas, skipping lifecycle events.
    pub fn drain_deltas(&self) -> Vec<Delta> {
        self.receiver
            .try_iter()
            .filter_map(|event| match event {
                SubscriptionEvent::Delta { delta } => Some(delta),
                SubscriptionEvent::Dropped { .. } => None,
            })
            .collect()
    }
}
