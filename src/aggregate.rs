//! Sentiment distribution, always recomputed from the store.

use crate::error::StoreError;
use crate::model::SentimentAggregate;
use crate::store::DynStore;

/// Derived view over `FeedbackStore::counts_by_label`. Holds no state of its
/// own, so there is nothing to invalidate after an insert.
#[derive(Clone)]
pub struct AggregateTracker {
    store: DynStore,
}

impl AggregateTracker {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    pub async fn current(&self) -> Result<SentimentAggregate, StoreError> {
        self.store.counts_by_label().await
    }
}
