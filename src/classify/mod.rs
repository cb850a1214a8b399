//! Sentiment classification: provider abstraction + concrete providers.
//!
//! The pipeline only sees `SentimentClassifier`. Retrying transient provider
//! failures is the client's own business (`RetryingClassifier`), never the
//! pipeline's.

pub mod azure;
pub mod lexicon;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{ClassifierConfig, ClassifierProvider};
use crate::error::ClassifyError;
use crate::model::ClassificationResult;

pub use azure::AzureTextClassifier;
pub use lexicon::LexiconClassifier;

/// One text in, one all-or-nothing classification out.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynClassifier = Arc<dyn SentimentClassifier>;

/// Retries `Unavailable` failures with exponential backoff. `Rejected` is final.
pub struct RetryingClassifier<C> {
    inner: C,
    max_retries: u32,
    base_delay: Duration,
}

impl<C: SentimentClassifier> RetryingClassifier<C> {
    pub fn new(inner: C, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        // 1x, 2x, 4x ... capped so a misconfigured retry count cannot overflow.
        self.base_delay.saturating_mul(1u32 << attempt.min(6))
    }
}

#[async_trait]
impl<C: SentimentClassifier> SentimentClassifier for RetryingClassifier<C> {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let mut attempt: u32 = 0;
        loop {
            match self.inner.classify(text).await {
                Ok(r) => return Ok(r),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    attempt += 1;
                    warn!(
                        provider = self.inner.provider_name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "classification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

/// Factory: build the configured provider, wrapped with retries.
///
/// Fails when the configuration is incomplete; callers treat that as fatal at
/// startup.
pub fn build_classifier(cfg: &ClassifierConfig) -> anyhow::Result<DynClassifier> {
    let base_delay = Duration::from_millis(cfg.retry_base_ms);
    let client: DynClassifier = match cfg.provider {
        ClassifierProvider::Azure => {
            let azure = AzureTextClassifier::from_config(cfg)?;
            Arc::new(RetryingClassifier::new(azure, cfg.max_retries, base_delay))
        }
        ClassifierProvider::Lexicon => Arc::new(LexiconClassifier::new()),
    };
    info!(
        provider = client.provider_name(),
        max_retries = cfg.max_retries,
        "sentiment classifier ready"
    );
    Ok(client)
}
