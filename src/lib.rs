//! # DataSync
//!
//! Subscription routing for real-time data synchronization. Given a stream
//! of change events against model records, decides which subscriber gets
//! which event, and in which form.
//!
//! ## Core Concepts
//!
//! - **Deltas**: a record was inserted, updated (old and new snapshot) or deleted
//! - **Dealers**: routing strategies that index subscription items by query
//! - **Filters**: a small comparison/boolean expression language over record fields
//! - **Reclassification**: an update reaches each subscriber as an insertion,
//!   update or deletion depending on whether the record matched its query
//!   before and after the change
//!
//! ## Example
//!
//! ```ignore
//! use datasync::{Delta, FilterDealer, SubscriptionConfig, SubscriptionManager};
//!
//! let manager = SubscriptionManager::new();
//! manager.register_dealer(FilterDealer::new("players_in_red"))?;
//!
//! let handle = manager.subscribe(SubscriptionConfig::default());
//! manager.add_item(handle.id, "players_in_red", json!(["==", "color", "red"]))?;
//!
//! // Alice turns red: this subscriber sees her for the first time.
//! manager.deliver_delta("players_in_red", &Delta::update(
//!     "player-1",
//!     json!({"name": "Alice", "color": "blue"}),
//!     json!({"name": "Alice", "color": "red"}),
//! ))?;
//! ```

pub mod codec;
pub mod dealers;
pub mod delta;
pub mod error;
pub mod filter;
pub mod pubsub;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use codec::Encoding;
pub use dealers::{
    BroadcastDealer, Dealer, DeliveryPlan, DeliveryStats, FieldKey, FilterDealer, ItemSet, KeyOf,
    SimpleDealer, Subscription, SubscriptionItem,
};
pub use delta::{Delta, DeltaKind};
pub use error::{DataSyncError, Result};
pub use filter::{CompareOp, FieldPath, Filter};
pub use pubsub::{
    AllowAll, ClientId, PubSubClient, PubSubConfig, PubSubMessage, PubSubService, PublishPolicy,
};
pub use subscriptions::{
    ChannelSubscription, DropReason, ManagerConfig, SubscriptionConfig, SubscriptionEvent,
    SubscriptionHandle, SubscriptionManager,
};
pub use types::{canonical_value, ItemId, ModelData, QueryKey, SubscriptionId};
