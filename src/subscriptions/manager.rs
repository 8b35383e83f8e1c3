//! Subscription manager: dealer registry plus per-subscription bookkeeping.

use crate::dealers::{Dealer, DeliveryStats, Subscription, SubscriptionItem};
use crate::delta::Delta;
use crate::error::{DataSyncError, Result};
use crate::types::{ItemId, SubscriptionId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::channel::{ChannelSubscription, OverflowLog};
use super::types::{DropReason, SubscriptionConfig, SubscriptionHandle};

/// Manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Config used by `subscribe_with_defaults`.
    pub default_subscription: SubscriptionConfig,

    /// Unsubscribe overflowed subscribers after each delivery.
    /// Default: true
    pub reap_overflowed: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_subscription: SubscriptionConfig::default(),
            reap_overflowed: true,
        }
    }
}

/// A dealer behind its own lock. The lock is held for one whole delivery or
/// one whole add/remove, so a delivery never sees a half-updated index.
type SharedDealer = Arc<Mutex<Box<dyn Dealer>>>;

/// Internal subscription state.
struct SubscriptionState {
    sink: Arc<ChannelSubscription>,
    /// Items by id, with the name of the dealer holding each one.
    items: HashMap<ItemId, (String, Arc<SubscriptionItem>)>,
}

/// Owns the dealers and the subscriptions registered in them.
///
/// Lock order is always subscription table, then dealer table, then a
/// single dealer.
pub struct SubscriptionManager {
    config: ManagerConfig,
    dealers: RwLock<HashMap<String, SharedDealer>>,
    subscriptions: RwLock<HashMap<SubscriptionId, SubscriptionState>>,
    next_id: AtomicU64,
    overflow_log: OverflowLog,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        Self {
            config,
            dealers: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            overflow_log: OverflowLog::default(),
        }
    }

    // --- Dealers ---

    /// Register a dealer under its name.
    pub fn register_dealer<D: Dealer + 'static>(&self, dealer: D) -> Result<()> {
        let name = dealer.name().to_string();
        let mut dealers = self.dealers.write();
        if dealers.contains_key(&name) {
            return Err(DataSyncError::DealerExists(name));
        }
        info!(dealer = %name, "Registered dealer");
        let dealer: Box<dyn Dealer> = Box::new(dealer);
        dealers.insert(name, Arc::new(Mutex::new(dealer)));
        Ok(())
    }

    /// Names of all registered dealers, sorted.
    pub fn dealer_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.dealers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a closure against a dealer while holding its lock.
    pub fn with_dealer<R>(&self, name: &str, f: impl FnOnce(&dyn Dealer) -> R) -> Result<R> {
        let dealer = self.dealer(name)?;
        let guard = dealer.lock();
        Ok(f(&**guard))
    }

    fn dealer(&self, name: &str) -> Result<SharedDealer> {
        self.dealers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DataSyncError::DealerNotFound(name.to_string()))
    }

    // --- Subscriptions ---

    /// Create a new subscription with no items yet.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sink, handle) =
            ChannelSubscription::with_overflow_log(id, &config, self.overflow_log.clone());

        self.subscriptions.write().insert(
            id,
            SubscriptionState {
                sink,
                items: HashMap::new(),
            },
        );
        debug!(subscription = %id, buffer_size = config.buffer_size, "Subscribed");

        handle
    }

    /// Create a subscription using the manager's default config.
    pub fn subscribe_with_defaults(&self) -> SubscriptionHandle {
        self.subscribe(self.config.default_subscription.clone())
    }

    /// Bind a subscription to a query in a dealer.
    ///
    /// Fails with `AlreadySubscribed` when the subscription already holds an
    /// equal query in the same dealer. If the dealer rejects the query
    /// nothing is recorded.
    pub fn add_item(&self, id: SubscriptionId, dealer_name: &str, query: Value) -> Result<ItemId> {
        let mut subs = self.subscriptions.write();
        let state = subs
            .get_mut(&id)
            .ok_or(DataSyncError::SubscriptionNotFound(id))?;

        let duplicate = state
            .items
            .values()
            .any(|(dealer, item)| dealer == dealer_name && item.query() == &query);
        if duplicate {
            return Err(DataSyncError::AlreadySubscribed);
        }

        let dealer = self.dealer(dealer_name)?;
        let subscription: Arc<dyn Subscription> = state.sink.clone();
        let item = SubscriptionItem::new(subscription, query);
        dealer.lock().add_subscription_item(item.clone())?;

        let item_id = item.id();
        state
            .items
            .insert(item_id, (dealer_name.to_string(), item));
        debug!(subscription = %id, dealer = dealer_name, item = %item_id, "Added item");

        Ok(item_id)
    }

    /// Remove one item from a subscription and from its dealer.
    pub fn remove_item(&self, id: SubscriptionId, item_id: ItemId) -> Result<()> {
        let mut subs = self.subscriptions.write();
        let state = subs
            .get_mut(&id)
            .ok_or(DataSyncError::SubscriptionNotFound(id))?;

        let (dealer_name, item) = state
            .items
            .remove(&item_id)
            .ok_or(DataSyncError::NotSubscribed)?;

        self.dealer(&dealer_name)?
            .lock()
            .remove_subscription_item(&item)?;
        debug!(subscription = %id, dealer = %dealer_name, item = %item_id, "Removed item");

        Ok(())
    }

    /// Unsubscribe and clean up every item.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        self.drop_subscription(id, DropReason::Unsubscribed)
    }

    fn drop_subscription(&self, id: SubscriptionId, reason: DropReason) -> Result<()> {
        let state = self
            .subscriptions
            .write()
            .remove(&id)
            .ok_or(DataSyncError::SubscriptionNotFound(id))?;

        // Every item goes even if one fails, so none is left dangling.
        let mut first_error = None;
        for (dealer_name, item) in state.items.into_values() {
            let removed = self.dealer(&dealer_name).and_then(|dealer| {
                let mut guard = dealer.lock();
                guard.remove_subscription_item(&item)
            });
            if let Err(e) = removed {
                first_error.get_or_insert(e);
            }
        }

        // Send dropped event (best effort)
        state.sink.close(reason.clone());
        debug!(subscription = %id, ?reason, "Unsubscribed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Item ids held by a subscription, sorted.
    pub fn items_of(&self, id: SubscriptionId) -> Result<Vec<ItemId>> {
        let subs = self.subscriptions.read();
        let state = subs.get(&id).ok_or(DataSyncError::SubscriptionNotFound(id))?;
        let mut ids: Vec<_> = state.items.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Total items across all subscriptions.
    pub fn item_count(&self) -> usize {
        self.subscriptions
            .read()
            .values()
            .map(|state| state.items.len())
            .sum()
    }

    // --- Delivery ---

    /// Route a delta through the named dealer.
    pub fn deliver_delta(&self, dealer_name: &str, delta: &Delta) -> Result<DeliveryStats> {
        let dealer = self.dealer(dealer_name)?;
        let stats = dealer.lock().deliver_delta(delta);

        if self.config.reap_overflowed {
            self.reap_overflowed();
        }

        Ok(stats)
    }

    /// Unsubscribe every subscriber whose queue overflowed.
    pub fn reap_overflowed(&self) -> usize {
        let overflowed: Vec<_> = std::mem::take(&mut *self.overflow_log.lock());
        let mut reaped = 0;
        for id in overflowed {
            if self.drop_subscription(id, DropReason::BufferOverflow).is_ok() {
                reaped += 1;
            }
        }
        reaped
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dealers::{BroadcastDealer, FilterDealer, SimpleDealer};
    use crate::subscriptions::SubscriptionEvent;
    use serde_json::json;
    use std::time::Duration;

    fn manager() -> SubscriptionManager {
        let manager = SubscriptionManager::new();
        manager.register_dealer(BroadcastDealer::new("all")).unwrap();
        manager
            .register_dealer(SimpleDealer::by_field("by_color", "color"))
            .unwrap();
        manager.register_dealer(FilterDealer::new("filtered")).unwrap();
        manager
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = manager();

        let handle = manager.subscribe(SubscriptionConfig::default());
        manager.add_item(handle.id, "all", json!(null)).unwrap();
        manager.add_item(handle.id, "by_color", json!("red")).unwrap();
        assert_eq!(manager.subscription_count(), 1);
        assert_eq!(manager.item_count(), 2);

        manager.unsubscribe(handle.id).unwrap();
        assert_eq!(manager.subscription_count(), 0);
        assert_eq!(manager.with_dealer("all", |d| d.item_count()).unwrap(), 0);
        assert_eq!(manager.with_dealer("by_color", |d| d.item_count()).unwrap(), 0);

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(
            event,
            SubscriptionEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        );
    }

    #[test]
    fn test_delivers_through_named_dealer() {
        let manager = manager();
        let handle = manager.subscribe_with_defaults();
        manager
            .add_item(handle.id, "filtered", json!([">", "n", 1]))
            .unwrap();

        let stats = manager
            .deliver_delta("filtered", &Delta::update("m", json!({"n": 0}), json!({"n": 2})))
            .unwrap();
        assert_eq!(stats.insertions, 1);

        assert_eq!(handle.drain_deltas(), vec![Delta::insertion("m", json!({"n": 2}))]);
    }

    #[test]
    fn test_already_subscribed() {
        let manager = manager();
        let handle = manager.subscribe_with_defaults();
        manager.add_item(handle.id, "by_color", json!("red")).unwrap();

        let result = manager.add_item(handle.id, "by_color", json!("red"));
        assert!(matches!(result, Err(DataSyncError::AlreadySubscribed)));

        // Same query in a different dealer is a different item
        manager.add_item(handle.id, "all", json!("red")).unwrap();
        assert_eq!(manager.item_count(), 2);
    }

    #[test]
    fn test_not_subscribed() {
        let manager = manager();
        let handle = manager.subscribe_with_defaults();
        let item = manager.add_item(handle.id, "all", json!(null)).unwrap();

        manager.remove_item(handle.id, item).unwrap();
        let result = manager.remove_item(handle.id, item);
        assert!(matches!(result, Err(DataSyncError::NotSubscribed)));
    }

    #[test]
    fn test_bad_query_leaves_no_bookkeeping() {
        let manager = manager();
        let handle = manager.subscribe_with_defaults();

        let result = manager.add_item(handle.id, "filtered", json!("not a filter"));
        assert!(matches!(result, Err(DataSyncError::BadQuery(_))));
        assert_eq!(manager.item_count(), 0);
        assert!(manager.items_of(handle.id).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_dealer_and_subscription() {
        let manager = manager();
        let handle = manager.subscribe_with_defaults();

        assert!(matches!(
            manager.add_item(handle.id, "nope", json!(null)),
            Err(DataSyncError::DealerNotFound(_))
        ));
        assert!(matches!(
            manager.add_item(SubscriptionId(999), "all", json!(null)),
            Err(DataSyncError::SubscriptionNotFound(_))
        ));
        assert!(matches!(
            manager.deliver_delta("nope", &Delta::insertion("m", json!({}))),
            Err(DataSyncError::DealerNotFound(_))
        ));
        assert!(matches!(
            manager.register_dealer(BroadcastDealer::new("all")),
            Err(DataSyncError::DealerExists(_))
        ));
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = manager();
        let handle = manager.subscribe(SubscriptionConfig { buffer_size: 2 });
        manager.add_item(handle.id, "all", json!(null)).unwrap();

        // Flood with events
        for i in 0..10 {
            manager
                .deliver_delta("all", &Delta::insertion("m", json!({"i": i})))
                .unwrap();
        }

        // Subscriber should be dropped
        assert_eq!(manager.subscription_count(), 0);
        assert_eq!(manager.with_dealer("all", |d| d.item_count()).unwrap(), 0);
    }

    #[test]
    fn test_zero_buffer_subscriber_survives_one_delta() {
        let manager = manager();
        let handle = manager.subscribe(SubscriptionConfig { buffer_size: 0 });
        manager.add_item(handle.id, "all", json!(null)).unwrap();

        manager
            .deliver_delta("all", &Delta::insertion("m", json!({"i": 0})))
            .unwrap();

        assert_eq!(manager.subscription_count(), 1);
        assert_eq!(handle.drain_deltas().len(), 1);
    }

    #[test]
    fn test_reaping_disabled() {
        let manager = SubscriptionManager::with_config(ManagerConfig {
            reap_overflowed: false,
            ..Default::default()
        });
        manager.register_dealer(BroadcastDealer::new("all")).unwrap();
        let handle = manager.subscribe(SubscriptionConfig { buffer_size: 1 });
        manager.add_item(handle.id, "all", json!(null)).unwrap();

        for i in 0..3 {
            manager
                .deliver_delta("all", &Delta::insertion("m", json!({"i": i})))
                .unwrap();
        }
        assert_eq!(manager.subscription_count(), 1);

        assert_eq!(manager.reap_overflowed(), 1);
        assert_eq!(manager.subscription_count(), 0);
    }
}
