// src/config/mod.rs
//! Service configuration: optional TOML file, then env overrides, then validation.
//!
//! Lookup order for the file:
//! 1) $FEEDBACK_CONFIG_PATH (must exist when set)
//! 2) config/feedback.toml
//! 3) built-in defaults

pub mod classifier;

pub use classifier::{ClassifierConfig, ClassifierProvider};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::gateway::MIN_SUBSCRIBER_BUFFER;

pub const ENV_CONFIG_PATH: &str = "FEEDBACK_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/feedback.toml";

fn default_database_url() -> String {
    "sqlite://feedback.db?mode=rwc".to_string()
}
fn default_subscriber_buffer() -> usize {
    64
}
fn default_recent_default() -> u32 {
    50
}
fn default_recent_max() -> u32 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Allowed browser origins; empty means permissive CORS.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Per-subscriber queue depth on the live channel.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    #[serde(default = "default_recent_default")]
    pub recent_default: u32,
    #[serde(default = "default_recent_max")]
    pub recent_max: u32,
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            classifier: ClassifierConfig::default(),
            cors_origins: Vec::new(),
            subscriber_buffer: default_subscriber_buffer(),
            recent_default: default_recent_default(),
            recent_max: default_recent_max(),
            metrics_enabled: false,
        }
    }
}

impl AppConfig {
    /// Full startup load: file, env overrides, placeholders, sanitize, validate.
    pub fn load() -> Result<Self> {
        let mut cfg = match config_path()? {
            Some(p) => Self::load_from_file(&p)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        cfg.classifier.resolve_env_placeholders()?;
        cfg.sanitize();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply overrides from a key lookup (the process env in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = get("CLASSIFIER_PROVIDER") {
            self.classifier.provider = v.parse()?;
        }
        if let Some(v) = get(classifier::ENV_ENDPOINT) {
            self.classifier.endpoint = Some(v);
        }
        if let Some(v) = get(classifier::ENV_API_KEY) {
            self.classifier.api_key = Some(v);
        }
        if let Some(v) = get("CLASSIFIER_LANGUAGE") {
            self.classifier.language = v;
        }
        if let Some(v) = get("CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse_num("CLASSIFIER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("CLASSIFIER_CONNECT_TIMEOUT_SECS") {
            self.classifier.connect_timeout_secs = parse_num("CLASSIFIER_CONNECT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("CLASSIFIER_MAX_RETRIES") {
            self.classifier.max_retries = parse_num("CLASSIFIER_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("SUBSCRIBER_BUFFER") {
            self.subscriber_buffer = parse_num("SUBSCRIBER_BUFFER", &v)?;
        }
        if let Some(v) = get("RECENT_DEFAULT") {
            self.recent_default = parse_num("RECENT_DEFAULT", &v)?;
        }
        if let Some(v) = get("RECENT_MAX") {
            self.recent_max = parse_num("RECENT_MAX", &v)?;
        }
        if let Some(v) = get("METRICS_ENABLED") {
            self.metrics_enabled = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn sanitize(&mut self) {
        self.classifier.sanitize();
        if self.subscriber_buffer == 0 {
            self.subscriber_buffer = default_subscriber_buffer();
        }
        self.subscriber_buffer = self.subscriber_buffer.max(MIN_SUBSCRIBER_BUFFER);
        if self.recent_max == 0 {
            self.recent_max = default_recent_max();
        }
        if self.recent_default == 0 {
            self.recent_default = default_recent_default();
        }
        self.recent_default = self.recent_default.min(self.recent_max);
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL must not be empty"));
        }
        self.classifier.validate()
    }
}

fn config_path() -> Result<Option<PathBuf>> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T> {
    v.parse::<T>()
        .map_err(|_| anyhow!("{key} must be a non-negative integer, got '{v}'"))
}
