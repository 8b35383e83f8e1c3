//! Exact-key dealer.

use super::{Dealer, ItemSet, SubscriptionItem};
use crate::error::{DataSyncError, Result};
use crate::filter::{get_field, FieldPath};
use crate::types::{ModelData, QueryKey};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Derives the routing key of a record.
///
/// Returning `None` means the record carries no key and reaches nobody.
pub trait KeyOf: Send {
    fn key_of(&self, model: &ModelData) -> Option<QueryKey>;
}

impl<F> KeyOf for F
where
    F: Fn(&ModelData) -> Option<QueryKey> + Send,
{
    fn key_of(&self, model: &ModelData) -> Option<QueryKey> {
        self(model)
    }
}

/// Uses the value of one (possibly nested) field as the key.
#[derive(Clone, Debug)]
pub struct FieldKey {
    path: FieldPath,
}

impl FieldKey {
    pub fn new(path: &str) -> Self {
        Self {
            path: FieldPath::parse(path),
        }
    }
}

impl KeyOf for FieldKey {
    fn key_of(&self, model: &ModelData) -> Option<QueryKey> {
        get_field(model, &self.path).map(QueryKey::from_value)
    }
}

/// Routes a record to the items whose query equals the record's key.
///
/// Each item's query is the key it wants, in wire form.
pub struct SimpleDealer<K> {
    name: String,
    key_of: K,
    items_by_key: HashMap<QueryKey, ItemSet>,
}

impl<K: KeyOf> SimpleDealer<K> {
    pub fn new(name: impl Into<String>, key_of: K) -> Self {
        Self {
            name: name.into(),
            key_of,
            items_by_key: HashMap::new(),
        }
    }

    /// Number of distinct keys with at least one item.
    pub fn key_count(&self) -> usize {
        self.items_by_key.len()
    }
}

impl SimpleDealer<FieldKey> {
    /// Dealer keyed by a field of the record.
    pub fn by_field(name: impl Into<String>, path: &str) -> Self {
        Self::new(name, FieldKey::new(path))
    }
}

impl<K: KeyOf> Dealer for SimpleDealer<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_subscription_item(&mut self, item: Arc<SubscriptionItem>) -> Result<()> {
        let key = QueryKey::from_value(item.query());
        let id = item.id();
        let bucket = self.items_by_key.entry(key).or_default();
        if !bucket.insert(item) {
            return Err(DataSyncError::ItemAlreadyRegistered {
                dealer: self.name.clone(),
                item: id,
            });
        }
        trace!(dealer = %self.name, item = %id, "Added subscription item");
        Ok(())
    }

    fn remove_subscription_item(&mut self, item: &SubscriptionItem) -> Result<()> {
        let key = QueryKey::from_value(item.query());
        let removed = match self.items_by_key.get_mut(&key) {
            Some(bucket) => {
                let removed = bucket.remove(item);
                if bucket.is_empty() {
                    self.items_by_key.remove(&key);
                }
                removed
            }
            None => false,
        };

        if !removed {
            warn!(dealer = %self.name, item = %item.id(), "Removing unknown subscription item");
            return Err(DataSyncError::ItemNotFound {
                dealer: self.name.clone(),
                item: item.id(),
            });
        }
        trace!(dealer = %self.name, item = %item.id(), "Removed subscription item");
        Ok(())
    }

    fn subscription_items_for_model(&self, model: &ModelData) -> ItemSet {
        self.key_of
            .key_of(model)
            .and_then(|key| self.items_by_key.get(&key))
            .cloned()
            .unwrap_or_default()
    }

    fn item_count(&self) -> usize {
        self.items_by_key.values().map(|bucket| bucket.len()).sum()
    }
}
