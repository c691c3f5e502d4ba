// HTTP indicator source.
//
// GET {base_url}/indicators/{id}?as_of={rfc3339} → {"value": number | null}.
// 404 means the source doesn't know the indicator yet and maps to no value.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use verdict_common::Indicator;

use crate::traits::IndicatorSource;

#[derive(Debug, Deserialize)]
struct ValueResponse {
    value: Option<f64>,
}

pub struct HttpIndicatorSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIndicatorSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build indicator HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, indicator_id: &str) -> String {
        format!("{}/indicators/{}", self.base_url, indicator_id)
    }
}

#[async_trait]
impl IndicatorSource for HttpIndicatorSource {
    async fn value(&self, indicator: &Indicator, as_of: DateTime<Utc>) -> Result<Option<f64>> {
        let resp = self
            .client
            .get(self.endpoint(&indicator.id))
            .query(&[("as_of", as_of.to_rfc3339_opts(SecondsFormat::Secs, true))])
            .send()
            .await
            .with_context(|| format!("Indicator request failed for {}", indicator.id))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: ValueResponse = resp
            .error_for_status()
            .with_context(|| format!("Indicator source rejected {}", indicator.id))?
            .json()
            .await
            .context("Failed to parse indicator response")?;
        Ok(body.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trims_trailing_slash() {
        let source = HttpIndicatorSource::new("https://stats.example/api/").unwrap();
        assert_eq!(source.endpoint("cl-cpi"), "https://stats.example/api/indicators/cl-cpi");
    }

    #[test]
    fn null_value_is_no_observation() {
        let body: ValueResponse = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(body.value, None);
        let body: ValueResponse = serde_json::from_str(r#"{"value": 4.2}"#).unwrap();
        assert_eq!(body.value, Some(4.2));
    }
}
