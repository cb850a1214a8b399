//! Error taxonomy for the feedback service.
//!
//! Each component has its own error enum; `IngestError` is what a submission
//! surfaces to its caller. Broadcast failures never reach the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure of the remote classification step. All-or-nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Provider unreachable, timed out, or answered with something unusable.
    #[error("classification unavailable: {0}")]
    Unavailable(String),

    /// Provider explicitly refused the input (e.g. unsupported language).
    #[error("classification rejected: {0}")]
    Rejected(String),
}

impl ClassifyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Storage-layer failure. An insert that fails leaves no partial record.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),

    /// A stored row could not be mapped back to a `FeedbackItem`.
    #[error("corrupt row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Fan-out reached none of the connected subscribers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("event {event} reached none of {attempted} subscribers")]
    NoSubscriberReached { event: &'static str, attempted: usize },
}

/// Outcome of a failed submission, as seen by the caller.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid feedback: {0}")]
    Validation(String),

    #[error("sentiment classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("sentiment classification rejected: {0}")]
    ClassificationRejected(String),

    #[error("feedback could not be stored: {0}")]
    Persistence(#[source] StoreError),

    /// The detached submission task panicked or was cancelled by the runtime.
    #[error("submission aborted: {0}")]
    Aborted(String),
}

impl From<ClassifyError> for IngestError {
    fn from(e: ClassifyError) -> Self {
        match e {
            ClassifyError::Unavailable(m) => Self::ClassificationUnavailable(m),
            ClassifyError::Rejected(m) => Self::ClassificationRejected(m),
        }
    }
}

impl IngestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ClassificationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::ClassificationRejected(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::ClassificationUnavailable(_) => "classification_unavailable",
            Self::ClassificationRejected(_) => "classification_rejected",
            Self::Persistence(_) => "persistence_failure",
            Self::Aborted(_) => "submission_aborted",
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

fn error_response(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(ErrorBody {
            error: code,
            message,
        }),
    )
        .into_response()
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        // Server-side details stay in the logs.
        let message = match &self {
            Self::Validation(m) => m.clone(),
            Self::ClassificationUnavailable(_) => {
                "sentiment analysis is temporarily unavailable".to_string()
            }
            Self::ClassificationRejected(_) => {
                "sentiment analysis rejected this feedback".to_string()
            }
            Self::Persistence(_) | Self::Aborted(_) => {
                "an error occurred while processing your feedback".to_string()
            }
        };
        error_response(self.status(), self.code(), message)
    }
}

/// Errors of the read-only endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("feedback {0} not found")]
    NotFound(i64),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(id) => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("feedback {id} not found"),
            ),
            Self::BadRequest(m) => error_response(StatusCode::BAD_REQUEST, "bad_request", m),
            Self::Store(e) => {
                tracing::error!(error = %e, "store read failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_failure",
                    "feedback could not be read".to_string(),
                )
            }
        }
    }
}
