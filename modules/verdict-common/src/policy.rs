//! Tunable thresholds for dedup, ranking, detection and resolution.
//!
//! The defaults are the historical values; resolutions computed under them
//! must stay reproducible, so overrides belong in the TOML config, not here.

use serde::Deserialize;

use crate::types::{IndicatorId, MeasureType, Sentiment};

// --- Deduplication ---

/// Tier-2 candidates are Decisions created within this many days.
pub const DEDUP_WINDOW_DAYS: i64 = 7;
/// Similarity above which a shared main topic confirms a duplicate.
pub const TOPIC_MATCH_SIMILARITY: f64 = 0.5;
/// Similarity above which two titles are duplicates regardless of topic.
pub const STRONG_SIMILARITY: f64 = 0.7;
/// Tier-3 compares against at most this many of the most recent candidates.
pub const SEMANTIC_CANDIDATE_LIMIT: usize = 10;
/// Hard per-call bound on a Tier-3 classification.
pub const SEMANTIC_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DedupPolicy {
    pub window_days: i64,
    pub topic_match_similarity: f64,
    pub strong_similarity: f64,
    pub semantic_candidate_limit: usize,
    pub semantic_timeout_secs: u64,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            window_days: DEDUP_WINDOW_DAYS,
            topic_match_similarity: TOPIC_MATCH_SIMILARITY,
            strong_similarity: STRONG_SIMILARITY,
            semantic_candidate_limit: SEMANTIC_CANDIDATE_LIMIT,
            semantic_timeout_secs: SEMANTIC_TIMEOUT_SECS,
        }
    }
}

// --- Clustering & ranking ---

/// Keywords a record must share with a cluster to join it.
pub const MIN_SHARED_KEYWORDS: usize = 2;
/// Score multiplier for topics already covered recently.
pub const DIVERSITY_PENALTY: f64 = 0.3;
/// Topics of Decisions created within this many hours count as recent.
pub const RECENT_TOPIC_HOURS: i64 = 24;
/// Recency bonus ramps over this many days.
pub const RECENCY_WINDOW_DAYS: i64 = 7;
/// Weight of the recency bonus in the composite score.
pub const RECENCY_WEIGHT: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingPolicy {
    pub min_shared_keywords: usize,
    pub diversity_penalty: f64,
    pub recent_topic_hours: i64,
    pub recency_window_days: i64,
    pub recency_weight: f64,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            min_shared_keywords: MIN_SHARED_KEYWORDS,
            diversity_penalty: DIVERSITY_PENALTY,
            recent_topic_hours: RECENT_TOPIC_HOURS,
            recency_window_days: RECENCY_WINDOW_DAYS,
            recency_weight: RECENCY_WEIGHT,
        }
    }
}

// --- Resolution ---

/// |variation%| below this is an insignificant change.
pub const SIGNIFICANCE_THRESHOLD_PCT: f64 = 5.0;
/// variation% is scaled by this into an indicator score.
pub const SCORE_MULTIPLIER: f64 = 2.0;
/// Indicator scores are clamped to ±this.
pub const MAX_INDICATOR_SCORE: f64 = 100.0;
/// Weighted score at or beyond ±this classifies as works/fails.
pub const CLASSIFICATION_BOUNDARY: f64 = 30.0;
pub const BASE_CONFIDENCE: f64 = 50.0;
pub const MIN_PARTIAL_CONFIDENCE: f64 = 30.0;

pub const WEIGHT_30D: f64 = 0.2;
pub const WEIGHT_90D: f64 = 0.3;
pub const WEIGHT_180D: f64 = 0.3;
pub const WEIGHT_365D: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionPolicy {
    pub significance_threshold_pct: f64,
    pub score_multiplier: f64,
    pub max_indicator_score: f64,
    pub classification_boundary: f64,
    pub base_confidence: f64,
    pub min_partial_confidence: f64,
    pub weight_30d: f64,
    pub weight_90d: f64,
    pub weight_180d: f64,
    pub weight_365d: f64,
    /// A Decision is swept once this many days have passed since its date.
    pub maturity_days: i64,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            significance_threshold_pct: SIGNIFICANCE_THRESHOLD_PCT,
            score_multiplier: SCORE_MULTIPLIER,
            max_indicator_score: MAX_INDICATOR_SCORE,
            classification_boundary: CLASSIFICATION_BOUNDARY,
            base_confidence: BASE_CONFIDENCE,
            min_partial_confidence: MIN_PARTIAL_CONFIDENCE,
            weight_30d: WEIGHT_30D,
            weight_90d: WEIGHT_90D,
            weight_180d: WEIGHT_180D,
            weight_365d: WEIGHT_365D,
            maturity_days: MeasureType::Days365.offset_days(),
        }
    }
}

impl ResolutionPolicy {
    /// Baseline carries no weight.
    pub fn window_weight(&self, measure: MeasureType) -> f64 {
        match measure {
            MeasureType::Baseline => 0.0,
            MeasureType::Days30 => self.weight_30d,
            MeasureType::Days90 => self.weight_90d,
            MeasureType::Days180 => self.weight_180d,
            MeasureType::Days365 => self.weight_365d,
        }
    }
}

// --- Detection run ---

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionPolicy {
    /// Maximum Decisions created per run.
    pub quota: usize,
    pub target_sentiment: Option<Sentiment>,
    /// Indicators attached to every synthesized Decision.
    pub default_indicator_ids: Vec<IndicatorId>,
    /// Concurrent feed fetches.
    pub feed_concurrency: usize,
    pub feed_timeout_secs: u64,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            quota: 5,
            target_sentiment: None,
            default_indicator_ids: Vec::new(),
            feed_concurrency: 5,
            feed_timeout_secs: 15,
        }
    }
}
