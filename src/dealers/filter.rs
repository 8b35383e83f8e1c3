//! Filter-expression dealer.

use super::{Dealer, ItemSet, SubscriptionItem};
use crate::error::{DataSyncError, Result};
use crate::filter::{matches, Filter};
use crate::types::ModelData;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{trace, warn};

/// Routes a record to the items whose filter it satisfies.
///
/// Arbitrary predicates cannot be indexed, so every lookup scans all
/// registered filters.
pub struct FilterDealer {
    name: String,
    filters_by_item: HashMap<Arc<SubscriptionItem>, Filter>,
}

impl FilterDealer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters_by_item: HashMap::new(),
        }
    }

    /// Parsed filter of a registered item.
    pub fn filter_for(&self, item: &SubscriptionItem) -> Option<&Filter> {
        self.filters_by_item.get(item)
    }

    /// Items matching a snapshot, without collecting them.
    pub fn matching_items<'a>(
        &'a self,
        model: &'a ModelData,
    ) -> impl Iterator<Item = &'a Arc<SubscriptionItem>> + 'a {
        self.filters_by_item
            .iter()
            .filter(move |(_, filter)| matches(model, filter))
            .map(|(item, _)| item)
    }
}

impl Dealer for FilterDealer {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_subscription_item(&mut self, item: Arc<SubscriptionItem>) -> Result<()> {
        if self.filters_by_item.contains_key(&item) {
            return Err(DataSyncError::ItemAlreadyRegistered {
                dealer: self.name.clone(),
                item: item.id(),
            });
        }

        let filter = Filter::parse(item.query())?;
        trace!(dealer = %self.name, item = %item.id(), "Added subscription item");
        self.filters_by_item.insert(item, filter);
        Ok(())
    }

    fn remove_subscription_item(&mut self, item: &SubscriptionItem) -> Result<()> {
        if self.filters_by_item.remove(item).is_none() {
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
        self.matching_items(model).cloned().collect()
    }

    fn item_count(&self) -> usize {
        self.filters_by_item.len()
    }
}
