// Collaborator boundaries for the engine.
//
// ContentFeed: where Content Records come from (RSS in production).
// Classifier: duplicate judgment and sentiment; Claude in production.
// EventSynthesizer: turns a ranked cluster into a DecisionDraft.
// IndicatorSource: indicator values at a point in time.
//
// Every call site wraps these in its own timeout, so implementations
// don't need to bound themselves.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use verdict_common::{ContentRecord, DecisionDraft, Indicator, Sentiment};

use crate::cluster::EventCluster;

// ---------------------------------------------------------------------------
// ContentFeed
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentFeed: Send + Sync {
    /// Label used in logs and reports.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<ContentRecord>>;
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Whether two event descriptions refer to the same real-world decision.
    async fn judge_duplicate(&self, candidate: &str, existing: &str) -> Result<bool>;

    async fn classify_sentiment(&self, title: &str, summary: Option<&str>) -> Result<Sentiment>;

    /// Newsworthiness in [0, 100]. `None` when the classifier doesn't score.
    async fn score_importance(&self, _title: &str, _summary: Option<&str>) -> Result<Option<f64>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// EventSynthesizer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EventSynthesizer: Send + Sync {
    async fn synthesize(&self, cluster: &EventCluster) -> Result<DecisionDraft>;
}

// ---------------------------------------------------------------------------
// IndicatorSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IndicatorSource: Send + Sync {
    /// Value of `indicator` as of `as_of`. `Ok(None)` when the source has no
    /// observation yet.
    async fn value(&self, indicator: &Indicator, as_of: DateTime<Utc>) -> Result<Option<f64>>;
}
