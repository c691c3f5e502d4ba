// RSS/Atom feed adapter.
// Returns ContentRecords; undated or untitled entries are skipped.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use verdict_common::ContentRecord;

use crate::traits::ContentFeed;

const FEED_TIMEOUT: Duration = Duration::from_secs(15);

pub struct RssFeed {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl RssFeed {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .context("Failed to build RSS HTTP client")?;
        Ok(Self {
            name: url.clone(),
            url,
            client,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl ContentFeed for RssFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ContentRecord>> {
        let resp = self
            .client
            .get(&self.url)
            .header("User-Agent", "verdict/0.1")
            .send()
            .await
            .context("RSS feed fetch failed")?
            .error_for_status()
            .context("RSS feed returned an error status")?;

        let bytes = resp.bytes().await.context("Failed to read RSS feed body")?;
        let records = parse_feed(&bytes, &self.name)?;
        info!(feed = self.name.as_str(), items = records.len(), "feed: parsed successfully");
        Ok(records)
    }
}

/// Parse an RSS/Atom/JSON feed body into Content Records.
pub fn parse_feed(body: &[u8], source: &str) -> Result<Vec<ContentRecord>> {
    let feed = feed_rs::parser::parse(body).context("Failed to parse RSS/Atom feed")?;

    let records = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())?;
            let Some(published_at) = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc))
            else {
                debug!(url = url.as_str(), "feed: skipping undated entry");
                return None;
            };

            Some(ContentRecord {
                title,
                url,
                published_at,
                source: source.to_string(),
                summary: entry.summary.map(|s| s.content),
            })
        })
        .collect();

    Ok(records)
}
