// tests/common/mod.rs
//
// In-memory fakes for the pipeline's three collaborators.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use feedback_sentiment_hub::classify::SentimentClassifier;
use feedback_sentiment_hub::model::{
    ClassificationResult, FeedbackItem, NewFeedback, SentimentAggregate, SentimentLabel,
};
use feedback_sentiment_hub::{
    BroadcastError, BroadcastGateway, ClassifyError, FeedEvent, FeedbackStore,
    IngestionPipeline, SqliteFeedbackStore, StoreError,
};

pub fn result(label: SentimentLabel, positive: f64, neutral: f64, negative: f64) -> ClassificationResult {
    ClassificationResult {
        label,
        positive,
        neutral,
        negative,
    }
}

pub fn positive(score: f64) -> ClassificationResult {
    result(SentimentLabel::Positive, score, (1.0 - score) / 2.0, (1.0 - score) / 2.0)
}

/// Pops scripted answers in order; falls back to Neutral when the script is empty.
#[derive(Default)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<ClassificationResult, ClassifyError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Result<ClassificationResult, ClassifyError>>,
    {
        Self {
            script: Mutex::new(answers.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentClassifier for ScriptedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(result(SentimentLabel::Neutral, 0.1, 0.8, 0.1)))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// Parks inside `classify` until released; signals when it got there.
pub struct GatedClassifier {
    answer: ClassificationResult,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedClassifier {
    pub fn new(answer: ClassificationResult) -> Self {
        Self {
            answer,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl SentimentClassifier for GatedClassifier {
    async fn classify(&self, _text: &str) -> Result<ClassificationResult, ClassifyError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.answer.clone())
    }

    fn provider_name(&self) -> &'static str {
        "gated"
    }
}

/// Real SQLite store whose inserts can be made to fail.
pub struct FlakyStore {
    pub inner: SqliteFeedbackStore,
    pub fail_inserts: AtomicBool,
    pub fail_counts: AtomicBool,
}

impl FlakyStore {
    pub async fn new() -> Self {
        Self {
            inner: SqliteFeedbackStore::in_memory().await.expect("in-memory store"),
            fail_inserts: AtomicBool::new(false),
            fail_counts: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FeedbackStore for FlakyStore {
    async fn insert(&self, item: NewFeedback) -> Result<FeedbackItem, StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence(sqlx::Error::PoolTimedOut));
        }
        self.inner.insert(item).await
    }

    async fn recent(&self, limit: u32) -> Result<Vec<FeedbackItem>, StoreError> {
        self.inner.recent(limit).await
    }

    async fn by_id(&self, id: i64) -> Result<Option<FeedbackItem>, StoreError> {
        self.inner.by_id(id).await
    }

    async fn counts_by_label(&self) -> Result<SentimentAggregate, StoreError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence(sqlx::Error::PoolTimedOut));
        }
        self.inner.counts_by_label().await
    }
}

/// Records every event; optionally reports every send as failed.
#[derive(Default)]
pub struct RecordingGateway {
    pub events: Mutex<Vec<FeedEvent>>,
    pub fail: AtomicBool,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: AtomicBool::new(true),
        }
    }

    pub fn events(&self) -> Vec<FeedEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl BroadcastGateway for RecordingGateway {
    async fn broadcast(&self, event: FeedEvent) -> Result<usize, BroadcastError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BroadcastError::NoSubscriberReached {
                event: event.name(),
                attempted: 3,
            });
        }
        self.events.lock().push(event);
        Ok(1)
    }
}

pub struct Harness {
    pub classifier: Arc<ScriptedClassifier>,
    pub store: Arc<FlakyStore>,
    pub gateway: Arc<RecordingGateway>,
    pub pipeline: Arc<IngestionPipeline>,
}

pub async fn harness(classifier: ScriptedClassifier, gateway: RecordingGateway) -> Harness {
    let classifier = Arc::new(classifier);
    let store = Arc::new(FlakyStore::new().await);
    let gateway = Arc::new(gateway);
    let pipeline = Arc::new(IngestionPipeline::new(
        classifier.clone(),
        store.clone(),
        gateway.clone(),
    ));
    Harness {
        classifier,
        store,
        gateway,
        pipeline,
    }
}
