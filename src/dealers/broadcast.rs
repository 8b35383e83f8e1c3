//! Dealer that sends every delta to every item.

use super::{Dealer, ItemSet, SubscriptionItem};
use crate::error::{DataSyncError, Result};
use crate::types::ModelData;
use std::sync::Arc;
use tracing::{trace, warn};

pub struct BroadcastDealer {
    name: String,
    items: ItemSet,
}

impl BroadcastDealer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: ItemSet::new(),
        }
    }
}

impl Dealer for BroadcastDealer {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_subscription_item(&mut self, item: Arc<SubscriptionItem>) -> Result<()> {
        let id = item.id();
        if !self.items.insert(item) {
            return Err(DataSyncError::ItemAlreadyRegistered {
                dealer: self.name.clone(),
                item: id,
            });
        }
        trace!(dealer = %self.name, item = %id, "Added subscription item");
        Ok(())
    }

    fn remove_subscription_item(&mut self, item: &SubscriptionItem) -> Result<()> {
        if !self.items.remove(item) {
            warn!(dealer = %self.name, item = %item.id(), "Removing unknown subscription item");
            return Err(DataSyncError::ItemNotFound {
                dealer: self.name.clone(),
                item: item.id(),
            });
        }
        trace!(dealer = %self.name, item = %item.id(), "Removed subscription item");
        Ok(())
    }

    fn subscription_items_for_model(&self, _model: &ModelData) -> ItemSet {
        self.items.clone()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }
}
