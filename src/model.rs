//! Domain types shared by the classifier, store, pipeline and HTTP layer.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage boundary limits (characters, not bytes).
pub const MAX_TEXT_CHARS: usize = 2000;
pub const MAX_LABEL_CHARS: usize = 50;
pub const MAX_CATEGORY_CHARS: usize = 100;

/// Sentiment label reported by the classification provider.
///
/// The four known labels are normalized to their capitalized form. Anything
/// else a provider may add later is kept verbatim in `Other` and scores 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
    Other(String),
}

impl SentimentLabel {
    /// Case-insensitive mapping of a provider label.
    pub fn from_provider(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "negative" => Self::Negative,
            "neutral" => Self::Neutral,
            "mixed" => Self::Mixed,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
            Self::Mixed => "Mixed",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for SentimentLabel {
    fn from(s: String) -> Self {
        Self::from_provider(&s)
    }
}

impl From<SentimentLabel> for String {
    fn from(l: SentimentLabel) -> Self {
        l.as_str().to_string()
    }
}

/// Transient provider answer for one text. Never persisted on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub label: SentimentLabel,
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl ClassificationResult {
    /// Confidence of the winning label; 0 for labels without a matching score.
    pub fn winning_score(&self) -> f64 {
        let raw = match self.label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Negative => self.negative,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Mixed | SentimentLabel::Other(_) => 0.0,
        };
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Body of `POST /api/feedback`. A missing `text` deserializes as empty and
/// is then rejected by validation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFeedbackRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A classified record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub text: String,
    pub category: Option<String>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

impl NewFeedback {
    pub fn with_id(self, id: i64) -> FeedbackItem {
        FeedbackItem {
            id,
            text: self.text,
            category: self.category,
            sentiment_label: self.sentiment_label,
            sentiment_score: self.sentiment_score,
            created_at: self.created_at,
        }
    }
}

/// A persisted feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub id: i64,
    pub text: String,
    pub category: Option<String>,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Count of stored items per sentiment label, derived from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentimentAggregate(BTreeMap<String, i64>);

impl SentimentAggregate {
    pub fn from_counts<I, S>(counts: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (label, n) in counts {
            *map.entry(label.into()).or_insert(0) += n;
        }
        Self(map)
    }

    pub fn count(&self, label: &str) -> i64 {
        self.0.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
