//! # Ingestion Pipeline
//! Classification → persistence → broadcast for one submitted feedback item.
//!
//! Lifecycle of a submission:
//! `Received → Classifying → Classified → Persisted → Broadcasting → Complete`,
//! with `Failed` reachable from `Classifying` and `Persisted`.
//!
//! Rules:
//! - Nothing is stored or broadcast unless classification succeeded.
//! - Nothing is broadcast unless the insert committed.
//! - Once the insert committed the submission succeeds, whatever happens to
//!   the broadcast. Broadcast problems are logged, never returned.
//! - Per submission the item event precedes the aggregate event, and the
//!   publish step of two submissions never interleaves.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tracing::{debug, error, info, warn};

use crate::aggregate::AggregateTracker;
use crate::classify::DynClassifier;
use crate::error::IngestError;
use crate::gateway::{DynGateway, FeedEvent};
use crate::model::{
    CreateFeedbackRequest, FeedbackItem, NewFeedback, MAX_CATEGORY_CHARS, MAX_TEXT_CHARS,
};
use crate::store::DynStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Classifying,
    Classified,
    Persisted,
    Broadcasting,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Classifying => "classifying",
            Stage::Classified => "classified",
            Stage::Persisted => "persisted",
            Stage::Broadcasting => "broadcasting",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated submission (text trimmed, blank category dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    pub text: String,
    pub category: Option<String>,
}

/// `Received` stage: reject what can never be stored.
pub fn validate(req: CreateFeedbackRequest) -> Result<ValidSubmission, IngestError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(IngestError::Validation("Feedback text is required".to_string()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(IngestError::Validation(format!(
            "Feedback text must be at most {MAX_TEXT_CHARS} characters"
        )));
    }

    let category = req
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from);
    if category
        .as_deref()
        .is_some_and(|c| c.chars().count() > MAX_CATEGORY_CHARS)
    {
        return Err(IngestError::Validation(format!(
            "Category must be at most {MAX_CATEGORY_CHARS} characters"
        )));
    }

    Ok(ValidSubmission {
        text: text.to_string(),
        category,
    })
}

pub struct IngestionPipeline {
    classifier: DynClassifier,
    store: DynStore,
    aggregates: AggregateTracker,
    gateway: DynGateway,
    /// Serializes aggregate recomputation + both sends of one submission.
    publish_lock: tokio::sync::Mutex<()>,
    /// Last handed-out `created_at`; keeps timestamps non-decreasing.
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl IngestionPipeline {
    pub fn new(classifier: DynClassifier, store: DynStore, gateway: DynGateway) -> Self {
        Self {
            aggregates: AggregateTracker::new(store.clone()),
            classifier,
            store,
            gateway,
            publish_lock: tokio::sync::Mutex::new(()),
            last_created_at: Mutex::new(None),
        }
    }

    pub fn aggregates(&self) -> &AggregateTracker {
        &self.aggregates
    }

    /// Run one submission to completion.
    pub async fn submit(&self, req: CreateFeedbackRequest) -> Result<FeedbackItem, IngestError> {
        counter!("feedback_submissions_total").increment(1);

        let sub = validate(req).map_err(|e| {
            counter!("feedback_pipeline_failures_total", "stage" => Stage::Received.as_str())
                .increment(1);
            debug!(error = %e, "submission rejected");
            e
        })?;
        debug!(stage = %Stage::Received, text_len = sub.text.len(), "submission accepted");

        debug!(stage = %Stage::Classifying, provider = self.classifier.provider_name());
        let started = Instant::now();
        let classification = self
            .classifier
            .classify(&sub.text)
            .await
            .map_err(|e| self.fail(Stage::Classifying, e.into()))?;
        histogram!("feedback_classify_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        let score = classification.winning_score();
        debug!(stage = %Stage::Classified, label = %classification.label, score);

        let new = NewFeedback {
            text: sub.text,
            category: sub.category,
            sentiment_label: classification.label,
            sentiment_score: score,
            created_at: self.next_timestamp(),
        };
        let item = self
            .store
            .insert(new)
            .await
            .map_err(|e| self.fail(Stage::Persisted, IngestError::Persistence(e)))?;
        debug!(stage = %Stage::Persisted, id = item.id);

        self.publish(&item).await;

        counter!("feedback_created_total", "label" => item.sentiment_label.to_string())
            .increment(1);
        info!(
            id = item.id,
            label = %item.sentiment_label,
            score = item.sentiment_score,
            stage = %Stage::Complete,
            "feedback created"
        );
        Ok(item)
    }

    /// Like [`IngestionPipeline::submit`] but on its own task, so a dropped
    /// caller cannot cut the work off between insert and broadcast.
    pub async fn submit_detached(
        self: &Arc<Self>,
        req: CreateFeedbackRequest,
    ) -> Result<FeedbackItem, IngestError> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.submit(req).await })
            .await
            .map_err(|e| {
                error!(error = %e, "submission task aborted");
                IngestError::Aborted(e.to_string())
            })?
    }

    fn fail(&self, stage: Stage, err: IngestError) -> IngestError {
        counter!("feedback_pipeline_failures_total", "stage" => stage.as_str()).increment(1);
        match &err {
            IngestError::Persistence(_) => {
                error!(stage = %stage, next = %Stage::Failed, error = %err, "submission failed")
            }
            _ => warn!(stage = %stage, next = %Stage::Failed, error = %err, "submission failed"),
        }
        err
    }

    /// `Broadcasting` stage. Never fails the submission.
    ///
    /// Item and aggregate go to the gateway as one batch, so a subscriber gets
    /// the pair whole or is dropped before seeing either half.
    async fn publish(&self, item: &FeedbackItem) {
        let _guard = self.publish_lock.lock().await;
        debug!(stage = %Stage::Broadcasting, id = item.id);

        let mut events = vec![FeedEvent::ItemCreated(item.clone())];
        match self.aggregates.current().await {
            Ok(aggregate) => events.push(FeedEvent::AggregateUpdated(aggregate)),
            Err(e) => {
                counter!("feedback_broadcast_failures_total").increment(1);
                warn!(id = item.id, error = %e, "aggregate recomputation failed; sending item only");
            }
        }

        let batch = events.len();
        match self.gateway.broadcast_batch(events).await {
            Ok(reached) => debug!(id = item.id, batch, reached, "events delivered"),
            Err(e) => {
                counter!("feedback_broadcast_failures_total").increment(1);
                warn!(id = item.id, error = %e, "broadcast failed; feedback is stored");
            }
        }
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self
            .last_created_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        let ts = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *last = Some(ts);
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: &str, category: Option<&str>) -> CreateFeedbackRequest {
        CreateFeedbackRequest {
            text: text.to_string(),
            category: category.map(String::from),
        }
    }

    #[test]
    fn blank_text_is_invalid() {
        for t in ["", "   ", "\n\t "] {
            assert!(matches!(validate(req(t, None)), Err(IngestError::Validation(_))));
        }
    }

    #[test]
    fn text_is_trimmed_and_blank_category_dropped() {
        let v = validate(req("  Great service!  ", Some("  "))).unwrap();
        assert_eq!(v.text, "Great service!");
        assert_eq!(v.category, None);
        let v = validate(req("ok", Some(" support "))).unwrap();
        assert_eq!(v.category.as_deref(), Some("support"));
    }

    #[test]
    fn length_limits_count_characters() {
        assert!(validate(req(&"é".repeat(MAX_TEXT_CHARS), None)).is_ok());
        assert!(validate(req(&"é".repeat(MAX_TEXT_CHARS + 1), None)).is_err());
        assert!(validate(req("ok", Some(&"c".repeat(MAX_CATEGORY_CHARS + 1)))).is_err());
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(Stage::Classifying.to_string(), "classifying");
        assert_eq!(Stage::Failed.as_str(), "failed");
    }
}
