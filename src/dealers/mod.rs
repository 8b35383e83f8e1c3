//! Dealers route deltas to the subscription items interested in them.
//!
//! A dealer indexes subscription items by their query. Given a delta it
//! computes the destination items and hands each one the delta *as that
//! subscriber should see it*: an update to a record can reach a subscriber
//! as an insertion (the record starts matching its query), an update (it
//! matched before and after) or a deletion (it stops matching).
//!
//! Three strategies are provided:
//! - [`BroadcastDealer`]: every item receives every delta
//! - [`SimpleDealer`]: items are keyed by an exact value derived from the record
//! - [`FilterDealer`]: items carry a filter expression evaluated per record
//!
//! # Example
//!
//! ```ignore
//! let mut dealer = FilterDealer::new("severe_logs");
//! dealer.add_subscription_item(SubscriptionItem::new(
//!     subscription,
//!     json!(["and", ["==", "service", "prosody"], [">=", "severity_level", 3]]),
//! ))?;
//!
//! // Reaches the subscriber as an insertion: it did not match before.
//! dealer.deliver_delta(&Delta::update(
//!     "log-1",
//!     json!({"service": "prosody", "severity_level": 2}),
//!     json!({"service": "prosody", "severity_level": 4}),
//! ));
//! ```

mod broadcast;
mod filter;
mod item;
mod simple;

pub use broadcast::BroadcastDealer;
pub use filter::FilterDealer;
pub use item::{ItemSet, Subscription, SubscriptionItem};
pub use simple::{FieldKey, KeyOf, SimpleDealer};

use crate::delta::Delta;
use crate::error::Result;
use crate::types::ModelData;
use std::sync::Arc;
use tracing::debug;

/// A routing strategy over an index of subscription items.
pub trait Dealer: Send {
    /// Name the dealer is registered under.
    fn name(&self) -> &str;

    /// Register an item. Registering the same item twice is rejected with
    /// `ItemAlreadyRegistered` and leaves the index untouched.
    fn add_subscription_item(&mut self, item: Arc<SubscriptionItem>) -> Result<()>;

    /// Deregister an item, failing with `ItemNotFound` if it was never added.
    fn remove_subscription_item(&mut self, item: &SubscriptionItem) -> Result<()>;

    /// Items whose query matches the snapshot.
    fn subscription_items_for_model(&self, model: &ModelData) -> ItemSet;

    /// Number of registered items.
    fn item_count(&self) -> usize;

    /// Route a delta to every interested item.
    fn deliver_delta(&self, delta: &Delta) -> DeliveryStats {
        let plan = DeliveryPlan::for_delta(self, delta);
        let stats = plan.stats();
        plan.execute();

        debug!(
            dealer = self.name(),
            model = delta.model(),
            inserted = stats.insertions,
            updated = stats.updates,
            deleted = stats.deletions,
            "Delivered delta"
        );

        stats
    }
}

/// How many items received each delta variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub insertions: usize,
    pub updates: usize,
    pub deletions: usize,
}

impl DeliveryStats {
    pub fn total(&self) -> usize {
        self.insertions + self.updates + self.deletions
    }
}

/// Destination items grouped by the delta each group receives.
///
/// Items inside a group are ordered by id so delivery order is stable.
#[derive(Debug)]
pub struct DeliveryPlan {
    pub groups: Vec<(Delta, Vec<Arc<SubscriptionItem>>)>,
}

impl DeliveryPlan {
    /// Work out who receives what for a delta.
    ///
    /// For updates the old and new matching sets are computed independently:
    /// items only in the new set get an insertion of the new data, items in
    /// both get the update unchanged, items only in the old set get a
    /// deletion of the old data.
    pub fn for_delta<D: Dealer + ?Sized>(dealer: &D, delta: &Delta) -> Self {
        let groups = match delta {
            Delta::Insertion { data, .. } | Delta::Deletion { data, .. } => {
                let dest = sorted(dealer.subscription_items_for_model(data).into_iter());
                vec![(delta.clone(), dest)]
            }
            Delta::Update {
                model,
                old_data,
                new_data,
            } => {
                let set_old = dealer.subscription_items_for_model(old_data);
                let set_new = dealer.subscription_items_for_model(new_data);

                let inserted = sorted(set_new.difference(&set_old).cloned());
                let updated = sorted(set_old.intersection(&set_new).cloned());
                let deleted = sorted(set_old.difference(&set_new).cloned());

                vec![
                    (Delta::insertion(model.clone(), new_data.clone()), inserted),
                    (delta.clone(), updated),
                    (Delta::deletion(model.clone(), old_data.clone()), deleted),
                ]
            }
        };

        Self { groups }
    }

    pub fn stats(&self) -> DeliveryStats {
        let mut stats = DeliveryStats::default();
        for (delta, items) in &self.groups {
            match delta {
                Delta::Insertion { .. } => stats.insertions += items.len(),
                Delta::Update { .. } => stats.updates += items.len(),
                Delta::Deletion { .. } => stats.deletions += items.len(),
            }
        }
        stats
    }

    /// Hand every delta to its items' subscriptions.
    pub fn execute(&self) {
        for (delta, items) in &self.groups {
            for item in items {
                item.subscription().deliver_delta(delta);
            }
        }
    }

    /// The delta a given item would receive, if any.
    pub fn delta_for(&self, item: &SubscriptionItem) -> Option<&Delta> {
        self.groups
            .iter()
            .find(|(_, items)| items.iter().any(|i| i.id() == item.id()))
            .map(|(delta, _)| delta)
    }
}

fn sorted(items: impl Iterator<Item = Arc<SubscriptionItem>>) -> Vec<Arc<SubscriptionItem>> {
    let mut items: Vec<_> = items.collect();
    items.sort_by_key(|item| item.id());
    items
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::SubscriptionId;
    use parking_lot::Mutex;

    /// Subscription that records everything delivered to it.
    pub struct RecordingSubscription {
        id: SubscriptionId,
        pub received: Mutex<Vec<Delta>>,
    }

    impl RecordingSubscription {
        pub fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: SubscriptionId(id),
                received: Mutex::new(Vec::new()),
            })
        }

        pub fn take(&self) -> Vec<Delta> {
            std::mem::take(&mut *self.received.lock())
        }
    }

    impl Subscription for RecordingSubscription {
        fn id(&self) -> SubscriptionId {
            self.id
        }

        fn deliver_delta(&self, delta: &Delta) {
            self.received.lock().push(delta.clone());
        }
    }
}
