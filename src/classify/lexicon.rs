//! Offline lexicon classifier for local runs and tests.
//!
//! Word weights with a three-token negation window. Deterministic and free of
//! network I/O; selected explicitly with `CLASSIFIER_PROVIDER=lexicon`.

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use super::SentimentClassifier;
use crate::error::ClassifyError;
use crate::model::{ClassificationResult, SentimentLabel};

static LEXICON: Lazy<HashMap<&'static str, i32>> = Lazy::new(|| {
    [
        ("great", 3),
        ("excellent", 3),
        ("amazing", 3),
        ("love", 3),
        ("fantastic", 3),
        ("awesome", 3),
        ("good", 2),
        ("happy", 2),
        ("helpful", 2),
        ("friendly", 2),
        ("fast", 1),
        ("easy", 1),
        ("nice", 1),
        ("thanks", 1),
        ("like", 1),
        ("bad", -2),
        ("poor", -2),
        ("slow", -1),
        ("rude", -2),
        ("broken", -2),
        ("confusing", -1),
        ("disappointed", -2),
        ("unhappy", -2),
        ("terrible", -3),
        ("awful", -3),
        ("hate", -3),
        ("worst", -3),
        ("horrible", -3),
    ]
    .into_iter()
    .collect()
});

/// Mass assigned to "neutral" before normalization.
const NEUTRAL_MASS: f64 = 0.5;

#[derive(Debug, Clone, Default)]
pub struct LexiconClassifier;

impl LexiconClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Returns (positive mass, negative mass, token count).
    fn masses(&self, text: &str) -> (f64, f64, usize) {
        // Collected because negation looks backwards.
        let tokens: Vec<String> = tokenize(text).collect();
        let (mut pos, mut neg) = (0.0, 0.0);

        for i in 0..tokens.len() {
            let base = LEXICON.get(tokens[i].as_str()).copied().unwrap_or(0);
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let adj = if negated { -base } else { base };
            if adj > 0 {
                pos += adj as f64;
            } else {
                neg += (-adj) as f64;
            }
        }
        (pos, neg, tokens.len())
    }
}

/// Alphanumeric tokens, lower-case; apostrophes kept so "isn't" survives.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "didn't"
            | "without"
    )
}

#[async_trait]
impl SentimentClassifier for LexiconClassifier {
    async fn classify(&self, text: &str) -> Result<ClassificationResult, ClassifyError> {
        let (pos, neg, tokens) = self.masses(text);
        if tokens == 0 {
            return Err(ClassifyError::Rejected("no classifiable words".to_string()));
        }

        let total = pos + neg + NEUTRAL_MASS;
        let (positive, negative, neutral) = (pos / total, neg / total, NEUTRAL_MASS / total);

        let label = if pos > 0.0 && pos == neg {
            SentimentLabel::Mixed
        } else if positive > neutral && positive > negative {
            SentimentLabel::Positive
        } else if negative > neutral && negative > positive {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        Ok(ClassificationResult {
            label,
            positive,
            neutral,
            negative,
        })
    }

    fn provider_name(&self) -> &'static str {
        "lexicon"
    }
}
