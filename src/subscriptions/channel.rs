//! Subscriptions backed by a bounded outbound queue.

use crate::dealers::Subscription;
use crate::delta::Delta;
use crate::types::SubscriptionId;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

use super::types::{DropReason, SubscriptionConfig, SubscriptionEvent, SubscriptionHandle};

/// Shared list of subscriptions whose queue overflowed since the last reap.
pub(crate) type OverflowLog = Arc<Mutex<Vec<SubscriptionId>>>;

/// Subscription that queues routed deltas for a consumer thread.
///
/// Delivery never blocks: when the queue is full or the consumer is gone
/// the subscription is marked overflowed and further deltas are discarded.
pub struct ChannelSubscription {
    id: SubscriptionId,
    sender: Sender<SubscriptionEvent>,
    overflowed: AtomicBool,
    overflow_log: Option<OverflowLog>,
}

impl ChannelSubscription {
    /// Create a standalone subscription and the handle reading from it.
    pub fn new(id: SubscriptionId, config: &SubscriptionConfig) -> (Arc<Self>, SubscriptionHandle) {
        Self::build(id, config, None)
    }

    pub(crate) fn with_overflow_log(
        id: SubscriptionId,
        config: &SubscriptionConfig,
        log: OverflowLog,
    ) -> (Arc<Self>, SubscriptionHandle) {
        Self::build(id, config, Some(log))
    }

    fn build(
        id: SubscriptionId,
        config: &SubscriptionConfig,
        overflow_log: Option<OverflowLog>,
    ) -> (Arc<Self>, SubscriptionHandle) {
        // A zero-capacity channel is a rendezvous that try_send always fails on
        let (sender, receiver) = bounded(config.buffer_size.max(1));
        let subscription = Arc::new(Self {
            id,
            sender,
            overflowed: AtomicBool::new(false),
            overflow_log,
        });
        (subscription, SubscriptionHandle { id, receiver })
    }

    /// Whether a delivery has been lost.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    /// Best-effort notice that the subscription is going away.
    pub fn close(&self, reason: DropReason) {
        let _ = self.sender.try_send(SubscriptionEvent::Dropped { reason });
    }

    fn mark_overflowed(&self, disconnected: bool) {
        if self.overflowed.swap(true, Ordering::AcqRel) {
            return;
        }
        warn!(
            subscription = %self.id,
            disconnected,
            "Dropping subscriber that cannot keep up"
        );
        if let Some(ref log) = self.overflow_log {
            log.lock().push(self.id);
        }
    }
}

impl Subscription for ChannelSubscription {
    fn id(&self) -> SubscriptionId {
        self.id
    }

    fn deliver_delta(&self, delta: &Delta) {
        if self.is_overflowed() {
            return;
        }
        let event = SubscriptionEvent::Delta {
            delta: delta.clone(),
        };
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.mark_overflowed(false),
            Err(TrySendError::Disconnected(_)) => self.mark_overflowed(true),
        }
    }
}
