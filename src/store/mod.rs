//! Durable feedback records.

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{FeedbackItem, NewFeedback, SentimentAggregate};

pub use sqlite::SqliteFeedbackStore;

/// Storage capability the pipeline and the HTTP layer depend on.
///
/// `insert` is atomic per call: on error no part of the record is visible.
/// Reads never mutate.
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Assigns the id and persists the record.
    async fn insert(&self, item: NewFeedback) -> Result<FeedbackItem, StoreError>;

    /// Newest first, at most `limit` items.
    async fn recent(&self, limit: u32) -> Result<Vec<FeedbackItem>, StoreError>;

    async fn by_id(&self, id: i64) -> Result<Option<FeedbackItem>, StoreError>;

    /// label -> count over every persisted item.
    async fn counts_by_label(&self) -> Result<SentimentAggregate, StoreError>;
}

pub type DynStore = Arc<dyn FeedbackStore>;
