// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod classify;
pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState, RecentLimits};
pub use crate::config::AppConfig;
pub use crate::error::{BroadcastError, ClassifyError, IngestError, StoreError};
pub use crate::gateway::{BroadcastGateway, FeedEvent, SubscriberRegistry};
pub use crate::model::{FeedbackItem, SentimentAggregate, SentimentLabel};
pub use crate::pipeline::IngestionPipeline;
pub use crate::store::{FeedbackStore, SqliteFeedbackStore};

use std::sync::Arc;

use axum::Router;
use tracing::info;

/// Wire store, classifier, registry and pipeline from a validated config and
/// build the full router.
///
/// Installs the Prometheus recorder when `metrics_enabled`; that may only
/// happen once per process.
pub async fn app(config: AppConfig) -> anyhow::Result<Router> {
    let store: crate::store::DynStore =
        Arc::new(SqliteFeedbackStore::connect(&config.database_url).await?);
    let classifier = classify::build_classifier(&config.classifier)?;
    let registry = SubscriberRegistry::new(config.subscriber_buffer);
    let pipeline = Arc::new(IngestionPipeline::new(
        classifier,
        store.clone(),
        Arc::new(registry.clone()),
    ));

    let limits = RecentLimits {
        default: config.recent_default,
        max: config.recent_max,
    };
    let state = AppState::new(pipeline, store, registry, limits);
    let mut router = api::router(state, api::cors_layer(&config.cors_origins));

    if config.metrics_enabled {
        let m = crate::metrics::Metrics::init()?;
        router = router.merge(m.router());
        info!("metrics exposed on /metrics");
    }
    Ok(router)
}
