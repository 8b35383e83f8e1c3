//! Subscription layer in front of the dealers.
//!
//! This module owns the subscriptions that dealers deliver to:
//! - A registry of named dealers, each behind its own lock
//! - Subscriptions with bounded outbound queues
//! - Items binding a subscription to a query in one dealer
//!
//! It rejects duplicate bindings (`AlreadySubscribed`) and removal of
//! bindings a subscription does not hold (`NotSubscribed`), and drops
//! subscribers whose queue overflows.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//! manager.register_dealer(FilterDealer::new("severe_logs"))?;
//!
//! let handle = manager.subscribe(SubscriptionConfig::default());
//! manager.add_item(handle.id, "severe_logs", json!([">=", "severity_level", 3]))?;
//!
//! manager.deliver_delta("severe_logs", &Delta::insertion("log-1", json!({"severity_level": 5})))?;
//!
//! loop {
//!     match handle.recv() {
//!         Ok(SubscriptionEvent::Delta { delta }) => println!("Got delta: {:?}", delta),
//!         Ok(SubscriptionEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! ```

mod channel;
mod manager;
mod types;

pub use channel::ChannelSubscription;
pub use manager::{ManagerConfig, SubscriptionManager};
pub use types::{DropReason, SubscriptionConfig, SubscriptionEvent, SubscriptionHandle};
