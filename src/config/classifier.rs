// src/config/classifier.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const ENV_ENDPOINT: &str = "AZURE_LANGUAGE_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_LANGUAGE_KEY";

fn default_language() -> String {
    "en".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_base_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierProvider {
    #[default]
    Azure,
    Lexicon,
}

impl std::str::FromStr for ClassifierProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "lexicon" => Ok(Self::Lexicon),
            other => anyhow::bail!("Unsupported classifier provider: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub provider: ClassifierProvider,
    /// Base URL of the language resource, e.g. `https://<name>.cognitiveservices.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// "ENV" means: read from AZURE_LANGUAGE_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: ClassifierProvider::default(),
            endpoint: None,
            api_key: None,
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl ClassifierConfig {
    /// Replace `"ENV"` placeholders with the corresponding env var.
    pub fn resolve_env_placeholders(&mut self) -> anyhow::Result<()> {
        if is_env_marker(self.api_key.as_deref()) {
            self.api_key = Some(
                env::var(ENV_API_KEY)
                    .map_err(|_| anyhow::anyhow!("Missing {ENV_API_KEY} env var"))?,
            );
        }
        if is_env_marker(self.endpoint.as_deref()) {
            self.endpoint = Some(
                env::var(ENV_ENDPOINT)
                    .map_err(|_| anyhow::anyhow!("Missing {ENV_ENDPOINT} env var"))?,
            );
        }
        Ok(())
    }

    /// Clamp numbers into usable ranges.
    pub fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > self.timeout_secs {
            self.connect_timeout_secs = self.timeout_secs.min(default_connect_timeout_secs());
        }
        self.max_retries = self.max_retries.min(5);
        if self.language.trim().is_empty() {
            self.language = default_language();
        }
    }

    /// A remote provider without endpoint or credential cannot start.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider != ClassifierProvider::Azure {
            return Ok(());
        }
        let endpoint = non_blank(self.endpoint.as_deref())
            .ok_or_else(|| anyhow::anyhow!("classifier endpoint not configured ({ENV_ENDPOINT})"))?;
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            anyhow::bail!("classifier endpoint must be an http(s) URL, got '{endpoint}'");
        }
        non_blank(self.api_key.as_deref())
            .ok_or_else(|| anyhow::anyhow!("classifier API key not configured ({ENV_API_KEY})"))?;
        Ok(())
    }
}

fn is_env_marker(v: Option<&str>) -> bool {
    v.is_some_and(|s| s.trim().eq_ignore_ascii_case("env"))
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
