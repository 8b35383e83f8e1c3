//! Subscription items: one subscriber bound to one query inside one dealer.

use crate::delta::Delta;
use crate::types::{ItemId, SubscriptionId};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Receiver of routed deltas.
///
/// Called once per destination item per routed delta. Implementations must
/// not fail back into the dealer: a delivery problem (full queue, closed
/// connection) is the subscription's own concern.
pub trait Subscription: Send + Sync {
    fn id(&self) -> SubscriptionId;

    fn deliver_delta(&self, delta: &Delta);
}

/// Binding of a subscription to a query.
///
/// Equality and hashing go by item identity only, so two items with the
/// same subscription and query are still distinct items.
pub struct SubscriptionItem {
    id: ItemId,
    subscription: Arc<dyn Subscription>,
    query: Value,
}

/// Set of items, compared by identity.
pub type ItemSet = HashSet<Arc<SubscriptionItem>>;

impl SubscriptionItem {
    pub fn new(subscription: Arc<dyn Subscription>, query: Value) -> Arc<Self> {
        Arc::new(Self {
            id: ItemId::next(),
            subscription,
            query,
        })
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn subscription(&self) -> &Arc<dyn Subscription> {
        &self.subscription
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Query in its wire form, as supplied at subscribe time.
    pub fn query(&self) -> &Value {
        &self.query
    }
}

impl PartialEq for SubscriptionItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriptionItem {}

impl Hash for SubscriptionItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SubscriptionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionItem")
            .field("id", &self.id)
            .field("subscription", &self.subscription.id())
            .field("query", &self.query)
            .finish()
    }
}
