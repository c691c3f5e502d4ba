use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::policy::{DedupPolicy, DetectionPolicy, RankingPolicy, ResolutionPolicy};
use crate::vocabulary::Vocabulary;

const DEFAULT_CLASSIFIER_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 5;

/// Secrets and environment-specific values. Policy lives in `FileConfig`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres URL; the in-memory store is used when unset.
    pub database_url: Option<String>,
    /// Classification is disabled when unset.
    pub anthropic_api_key: Option<String>,
    pub classifier_model: String,
    pub classifier_timeout_secs: u64,
    pub feed_urls: Vec<String>,
    /// HTTP endpoint serving indicator values; refresh is unavailable when unset.
    pub indicator_source_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: non_empty_env("DATABASE_URL"),
            anthropic_api_key: non_empty_env("ANTHROPIC_API_KEY"),
            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| DEFAULT_CLASSIFIER_MODEL.to_string()),
            classifier_timeout_secs: match env::var("CLASSIFIER_TIMEOUT_SECS") {
                Ok(v) => v
                    .parse()
                    .context("CLASSIFIER_TIMEOUT_SECS must be a number")?,
                Err(_) => DEFAULT_CLASSIFIER_TIMEOUT_SECS,
            },
            feed_urls: parse_list(&env::var("FEED_URLS").unwrap_or_default()),
            indicator_source_url: non_empty_env("INDICATOR_SOURCE_URL"),
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        fn preview(val: &Option<String>) -> String {
            match val {
                Some(v) if !v.is_empty() => {
                    let n = v.len().min(5);
                    format!("{}...({} chars)", &v[..n], v.len())
                }
                _ => "<not set>".to_string(),
            }
        }

        tracing::info!(
            database_url = %preview(&self.database_url),
            anthropic_api_key = %preview(&self.anthropic_api_key),
            classifier_model = %self.classifier_model,
            classifier_timeout_secs = self.classifier_timeout_secs,
            feeds = self.feed_urls.len(),
            indicator_source = self.indicator_source_url.as_deref().unwrap_or("<not set>"),
            "Config loaded"
        );
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// TOML-backed policy configuration. Every section is optional and defaults
/// to the historical constants.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub vocabulary: Vocabulary,
    pub dedup: DedupPolicy,
    pub ranking: RankingPolicy,
    pub resolution: ResolutionPolicy,
    pub detection: DetectionPolicy,
}

impl FileConfig {
    /// Load and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
