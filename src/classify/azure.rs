//! Azure AI Language sentiment provider (REST, v3.1).

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SentimentClassifier;
use crate::config::ClassifierConfig;
use crate::error::ClassifyError;
use crate::model::{ClassificationResult, SentimentLabel};

const SENTIMENT_PATH: &str = "/text/analytics/v3.1/sentiment";
const DOCUMENT_ID: &str = "1";

pub struct AzureTextClassifier {
    http: reqwest::Client,
    url: String,
    api_key: String,
    language: String,
}

impl AzureTextClassifier {
    pub fn from_config(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let endpoint = cfg
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("classifier endpoint not configured"))?;
        let api_key = cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("classifier API key not configured"))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("feedback-sentiment-hub/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building HTTP client for sentiment provider")?;

        Ok(Self {
            http,
            url: format!("{}{}", endpoint.trim_end_matches('/'), SENTIMENT_PATH),
            api_key: api_key.to_string(),
            language: cfg.language.clone(),
        })
    }
}

#[derive(Serialize)]
struct Req<'a> {
    documents: [Doc<'a>; 1],
}

#[derive(Serialize)]
struct Doc<'a> {
    id: &'a str,
    language: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    documents: Vec<DocSentiment>,
    #[serde(default)]
    errors: Vec<DocError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocSentiment {
    id: String,
    sentiment: String,
    confidence_scores: Scores,
}

#[derive(Deserialize)]
struct Scores {
    positive: f64,
    neutral: f64,
    negative: f64,
}

#[derive(Deserialize)]
struct DocError {
    id: String,
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    innererror: Option<Box<ErrorDetail>>,
}

impl ErrorDetail {
    /// Innermost code is the most specific one (e.g. `UnsupportedLanguageCode`).
    fn describe(&self) -> String {
        match &self.innererror {
            Some(inner) => inner.describe(),
            None => format!("{}: {}", self.code, self.message),
        }
    }
}

/// Map an HTTP status + body to a classification outcome.
pub(crate) fn map_response(status: StatusCode, body: &str) -> Result<ClassificationResult, ClassifyError> {
    if status == StatusCode::BAD_REQUEST || status == StatusCode::UNPROCESSABLE_ENTITY {
        let reason = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.describe())
            .unwrap_or_else(|_| format!("HTTP {status}"));
        return Err(ClassifyError::Rejected(reason));
    }
    if !status.is_success() {
        return Err(ClassifyError::Unavailable(format!("HTTP {status}")));
    }

    let resp: Resp = serde_json::from_str(body)
        .map_err(|e| ClassifyError::Unavailable(format!("malformed response: {e}")))?;

    if let Some(err) = resp.errors.iter().find(|e| e.id == DOCUMENT_ID) {
        return Err(ClassifyError::Rejected(err.error.describe()));
    }

    let doc = resp
        .documents
        .into_iter()
        .find(|d| d.id == DOCUMENT_ID)
        .ok_or_else(|| ClassifyError::Unavailable("empty response".to_string()))?;

    if doc.sentiment.trim().is_empty() {
        return Err(ClassifyError::Unavailable("response without sentiment label".to_string()));
    }

    Ok(ClassificationResult {
        label: SentimentLabel::from_provider(&doc.sentiment),
        positive: doc.confidence_scores.positive,
        neutral: doc.confidence_scores.neutral,
        negative: doc.confidence_scores.negative,
    })
}

#[async_trait]
impl SentimentClassifier for AzureTextClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let req = Req {
            documents: [Doc {
                id: DOCUMENT_ID,
                language: &self.language,
                text,
            }],
        };

        let resp = self
            .http
            .post(&self.url)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ClassifyError::Unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ClassifyError::Unavailable(format!("reading body failed: {e}")))?;
        debug!(%status, body_len = body.len(), "sentiment provider answered");

        map_response(status, &body)
    }

    fn provider_name(&self) -> &'static str {
        "azure"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_maps_label_and_scores() {
        let body = r#"{
            "documents": [{
                "id": "1",
                "sentiment": "positive",
                "confidenceScores": {"positive": 0.92, "neutral": 0.06, "negative": 0.02},
                "sentences": [],
                "warnings": []
            }],
            "errors": [],
            "modelVersion": "2022-11-01"
        }"#;
        let r = map_response(StatusCode::OK, body).unwrap();
        assert_eq!(r.label, SentimentLabel::Positive);
        assert_eq!(r.winning_score(), 0.92);
    }

    #[test]
    fn document_error_is_a_rejection() {
        let body = r#"{
            "documents": [],
            "errors": [{"id": "1", "error": {"code": "InvalidArgument", "message": "Invalid document",
                "innererror": {"code": "UnsupportedLanguageCode", "message": "xx is not supported"}}}]
        }"#;
        let err = map_response(StatusCode::OK, body).unwrap_err();
        match err {
            ClassifyError::Rejected(m) => assert!(m.contains("UnsupportedLanguageCode")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn bad_request_is_a_rejection() {
        let body = r#"{"error": {"code": "InvalidRequest", "message": "text too long"}}"#;
        let err = map_response(StatusCode::BAD_REQUEST, body).unwrap_err();
        assert!(matches!(err, ClassifyError::Rejected(_)));
    }

    #[test]
    fn server_and_auth_errors_are_unavailable() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = map_response(status, "").unwrap_err();
            assert!(matches!(err, ClassifyError::Unavailable(_)), "{status}");
        }
    }

    #[test]
    fn malformed_or_empty_bodies_are_unavailable() {
        assert!(matches!(
            map_response(StatusCode::OK, "not json").unwrap_err(),
            ClassifyError::Unavailable(_)
        ));
        assert!(matches!(
            map_response(StatusCode::OK, r#"{"documents": [], "errors": []}"#).unwrap_err(),
            ClassifyError::Unavailable(_)
        ));
    }

    #[test]
    fn unknown_label_passes_through_with_zero_score() {
        let body = r#"{"documents": [{"id": "1", "sentiment": "ambivalent",
            "confidenceScores": {"positive": 0.4, "neutral": 0.3, "negative": 0.3}}]}"#;
        let r = map_response(StatusCode::OK, body).unwrap();
        assert_eq!(r.label, SentimentLabel::Other("ambivalent".into()));
        assert_eq!(r.winning_score(), 0.0);
    }

    #[test]
    fn missing_configuration_is_an_error() {
        let cfg = ClassifierConfig::default();
        assert!(AzureTextClassifier::from_config(&cfg).is_err());
    }
}
