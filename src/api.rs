use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::Stream;
use std::convert::Infallible;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::aggregate::AggregateTracker;
use crate::error::{ApiError, IngestError};
use crate::gateway::{sse, SubscriberRegistry};
use crate::model::{CreateFeedbackRequest, FeedbackItem, SentimentAggregate};
use crate::pipeline::IngestionPipeline;
use crate::store::DynStore;

/// Bounds for `GET /api/feedback/recent`.
#[derive(Debug, Clone, Copy)]
pub struct RecentLimits {
    pub default: u32,
    pub max: u32,
}

impl Default for RecentLimits {
    fn default() -> Self {
        Self { default: 50, max: 500 }
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<IngestionPipeline>,
    store: DynStore,
    aggregates: AggregateTracker,
    registry: SubscriberRegistry,
    limits: RecentLimits,
}

impl AppState {
    pub fn new(
        pipeline: Arc<IngestionPipeline>,
        store: DynStore,
        registry: SubscriberRegistry,
        limits: RecentLimits,
    ) -> Self {
        Self {
            aggregates: pipeline.aggregates().clone(),
            pipeline,
            store,
            registry,
            limits,
        }
    }
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/feedback", post(create_feedback))
        .route("/api/feedback/recent", get(recent_feedback))
        .route("/api/feedback/trends", get(sentiment_trends))
        .route("/api/feedback/live", get(live_channel))
        .route("/api/feedback/{id}", get(get_feedback))
        .layer(cors)
        .with_state(state)
}

/// Explicit origins when configured, otherwise very permissive.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::very_permissive();
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn create_feedback(
    State(state): State<AppState>,
    payload: Result<Json<CreateFeedbackRequest>, JsonRejection>,
) -> Result<Response, IngestError> {
    let Json(body) = payload.map_err(|e| IngestError::Validation(e.body_text()))?;
    let item = state.pipeline.submit_detached(body).await?;
    let location = format!("/api/feedback/{}", item.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(item),
    )
        .into_response())
}

async fn get_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<FeedbackItem>, ApiError> {
    state
        .store
        .by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

#[derive(serde::Deserialize)]
struct RecentQuery {
    count: Option<i64>,
}

async fn recent_feedback(
    State(state): State<AppState>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<Vec<FeedbackItem>>, ApiError> {
    let limit = match q.count {
        None => state.limits.default,
        Some(n) if n < 1 => {
            return Err(ApiError::BadRequest("count must be a positive integer".to_string()))
        }
        Some(n) => n.min(i64::from(state.limits.max)) as u32,
    };
    Ok(Json(state.store.recent(limit).await?))
}

async fn sentiment_trends(
    State(state): State<AppState>,
) -> Result<Json<SentimentAggregate>, ApiError> {
    Ok(Json(state.aggregates.current().await?))
}

async fn live_channel(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse::sse_response(state.registry.subscribe())
}
