//! SQLite-backed `FeedbackStore` (sqlx).
//!
//! Column limits mirror the storage boundary: text 1..=2000 chars, label
//! 1..=50 chars, category <= 100 chars. SQLite `length()` counts characters.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use super::FeedbackStore;
use crate::error::StoreError;
use crate::model::{FeedbackItem, NewFeedback, SentimentAggregate, SentimentLabel};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        text            TEXT    NOT NULL CHECK (length(text) BETWEEN 1 AND 2000),
        category        TEXT             CHECK (category IS NULL OR length(category) <= 100),
        sentiment_label TEXT    NOT NULL CHECK (length(sentiment_label) BETWEEN 1 AND 50),
        sentiment_score REAL    NOT NULL,
        created_at      TEXT    NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_feedback_created_at ON feedback (created_at DESC, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_feedback_label ON feedback (sentiment_label)",
];

#[derive(Clone)]
pub struct SqliteFeedbackStore {
    pool: SqlitePool,
}

impl SqliteFeedbackStore {
    /// Open (creating the file if needed) and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!(url, "feedback store ready");
        Ok(store)
    }

    /// Private in-memory database; one connection so every query sees the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self { pool })
    }
}

fn map_row(row: &SqliteRow) -> Result<FeedbackItem, StoreError> {
    let id: i64 = row.try_get("id")?;
    let label: String = row.try_get("sentiment_label")?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| StoreError::Corrupt {
        id,
        reason: format!("created_at: {e}"),
    })?;
    Ok(FeedbackItem {
        id,
        text: row.try_get("text")?,
        category: row.try_get("category")?,
        sentiment_label: SentimentLabel::from_provider(&label),
        sentiment_score: row.try_get("sentiment_score")?,
        created_at,
    })
}

#[async_trait]
impl FeedbackStore for SqliteFeedbackStore {
    async fn insert(&self, item: NewFeedback) -> Result<FeedbackItem, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO feedback (text, category, sentiment_label, sentiment_score, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.text)
        .bind(&item.category)
        .bind(item.sentiment_label.as_str())
        .bind(item.sentiment_score)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, label = %item.sentiment_label, "feedback row inserted");
        Ok(item.with_id(id))
    }

    async fn recent(&self, limit: u32) -> Result<Vec<FeedbackItem>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT id, text, category, sentiment_label, sentiment_score, created_at
            FROM feedback
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    async fn by_id(&self, id: i64) -> Result<Option<FeedbackItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, text, category, sentiment_label, sentiment_score, created_at
            FROM feedback
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn counts_by_label(&self) -> Result<SentimentAggregate, StoreError> {
        let rows = sqlx::query(
            "SELECT sentiment_label, COUNT(*) AS n FROM feedback GROUP BY sentiment_label",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = Vec::with_capacity(rows.len());
        for row in &rows {
            let label: String = row.try_get("sentiment_label")?;
            let n: i64 = row.try_get("n")?;
            counts.push((label, n));
        }
        Ok(SentimentAggregate::from_counts(counts))
    }
}
