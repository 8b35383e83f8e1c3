//! Error types for subscription routing.

use crate::pubsub::ClientId;
use crate::types::{ItemId, SubscriptionId};
use thiserror::Error;

/// Main error type for routing and subscription operations.
#[derive(Debug, Error)]
pub enum DataSyncError {
    #[error("Bad query: {0}")]
    BadQuery(String),

    #[error("Subscription item {item} not found in dealer {dealer}")]
    ItemNotFound { dealer: String, item: ItemId },

    #[error("Subscription item {item} already registered in dealer {dealer}")]
    ItemAlreadyRegistered { dealer: String, item: ItemId },

    #[error("Already subscribed")]
    AlreadySubscribed,

    #[error("Not subscribed")]
    NotSubscribed,

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(SubscriptionId),

    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    #[error("Dealer not found: {0}")]
    DealerNotFound(String),

    #[error("Dealer already exists: {0}")]
    DealerExists(String),

    #[error("Not authorized to publish on channel {channel}")]
    NotAuthorized { channel: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for DataSyncError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            DataSyncError::Deserialization(e.to_string())
        } else {
            DataSyncError::Serialization(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for DataSyncError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        DataSyncError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for DataSyncError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        DataSyncError::Deserialization(e.to_string())
    }
}

/// Result type for routing and subscription operations.
pub type Result<T> = std::result::Result<T, DataSyncError>;
