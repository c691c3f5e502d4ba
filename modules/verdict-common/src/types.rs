use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::error::VerdictError;
use crate::hash::content_hash;

pub type IndicatorId = String;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Announced,
    Tracking,
    Resolved,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Announced => "announced",
            DecisionStatus::Tracking => "tracking",
            DecisionStatus::Resolved => "resolved",
        }
    }

    /// Status never moves backward: announced < tracking < resolved.
    pub fn can_advance_to(&self, next: DecisionStatus) -> bool {
        self.rank() < next.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            DecisionStatus::Announced => 0,
            DecisionStatus::Tracking => 1,
            DecisionStatus::Resolved => 2,
        }
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStatus {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "announced" => Ok(DecisionStatus::Announced),
            "tracking" => Ok(DecisionStatus::Tracking),
            "resolved" => Ok(DecisionStatus::Resolved),
            other => Err(VerdictError::Database(format!("unknown decision status: {other}"))),
        }
    }
}

/// Fixed sampling offsets relative to a Decision's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasureType {
    #[serde(rename = "baseline")]
    Baseline,
    #[serde(rename = "30d")]
    Days30,
    #[serde(rename = "90d")]
    Days90,
    #[serde(rename = "180d")]
    Days180,
    #[serde(rename = "365d")]
    Days365,
}

impl MeasureType {
    pub const ALL: [MeasureType; 5] = [
        MeasureType::Baseline,
        MeasureType::Days30,
        MeasureType::Days90,
        MeasureType::Days180,
        MeasureType::Days365,
    ];

    pub const POST_BASELINE: [MeasureType; 4] = [
        MeasureType::Days30,
        MeasureType::Days90,
        MeasureType::Days180,
        MeasureType::Days365,
    ];

    pub fn offset_days(&self) -> i64 {
        match self {
            MeasureType::Baseline => 0,
            MeasureType::Days30 => 30,
            MeasureType::Days90 => 90,
            MeasureType::Days180 => 180,
            MeasureType::Days365 => 365,
        }
    }

    /// When this window becomes measurable for a Decision dated `date`.
    pub fn due_at(&self, date: DateTime<Utc>) -> DateTime<Utc> {
        date + Duration::days(self.offset_days())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Baseline => "baseline",
            MeasureType::Days30 => "30d",
            MeasureType::Days90 => "90d",
            MeasureType::Days180 => "180d",
            MeasureType::Days365 => "365d",
        }
    }
}

impl std::fmt::Display for MeasureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureType {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MeasureType::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| VerdictError::Config(format!("unknown measure type: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl FromStr for Sentiment {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(VerdictError::Config(format!("unknown sentiment: {other}"))),
        }
    }
}

/// Outcome classification of a resolved Decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Issue {
    Works,
    Partial,
    Fails,
}

impl Issue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Issue::Works => "works",
            Issue::Partial => "partial",
            Issue::Fails => "fails",
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Issue {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "works" => Ok(Issue::Works),
            "partial" => Ok(Issue::Partial),
            "fails" => Ok(Issue::Fails),
            other => Err(VerdictError::Config(format!("unknown issue: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    WeightedIndicators,
    Manual,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionMethod::WeightedIndicators => "weighted_indicators",
            ResolutionMethod::Manual => "manual",
        }
    }
}

impl FromStr for ResolutionMethod {
    type Err = VerdictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weighted_indicators" => Ok(ResolutionMethod::WeightedIndicators),
            "manual" => Ok(ResolutionMethod::Manual),
            other => Err(VerdictError::Database(format!("unknown resolution method: {other}"))),
        }
    }
}

// --- Content ---

/// One normalized report about an event, supplied by a feed collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub summary: Option<String>,
}

// --- Decisions ---

/// Fields the event synthesis step produces before a Decision is stored.
#[derive(Debug, Clone, TypedBuilder)]
pub struct DecisionDraft {
    #[builder(setter(into))]
    pub title: String,
    #[builder(setter(into))]
    pub source_url: String,
    #[builder(default, setter(strip_option, into))]
    pub summary: Option<String>,
    pub date: DateTime<Utc>,
    #[builder(default)]
    pub indicator_ids: Vec<IndicatorId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content_hash: String,
    pub source_url: String,
    pub status: DecisionStatus,
    pub indicator_ids: Vec<IndicatorId>,
    pub main_topic: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    pub fn from_draft(draft: DecisionDraft, main_topic: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content_hash: content_hash(&draft.title, &draft.source_url),
            title: draft.title,
            summary: draft.summary,
            source_url: draft.source_url,
            status: DecisionStatus::Announced,
            indicator_ids: draft.indicator_ids,
            main_topic,
            date: draft.date,
            created_at: now,
        }
    }
}

/// Partial update applied by `DecisionStore::patch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecisionPatch {
    pub status: Option<DecisionStatus>,
    pub indicator_ids: Option<Vec<IndicatorId>>,
}

impl DecisionPatch {
    pub fn status(status: DecisionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply to a decision in place. Backward status moves are ignored.
    pub fn apply(&self, decision: &mut Decision) {
        if let Some(status) = self.status {
            if decision.status.can_advance_to(status) {
                decision.status = status;
            }
        }
        if let Some(ids) = &self.indicator_ids {
            decision.indicator_ids = ids.clone();
        }
    }
}

// --- Indicators ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: IndicatorId,
    pub name: String,
    /// Label of the data source the values come from (e.g. "fred", "worldbank").
    pub source_kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDataPoint {
    pub decision_id: Uuid,
    pub indicator_id: IndicatorId,
    pub measure_type: MeasureType,
    pub value: f64,
    pub date: DateTime<Utc>,
}

// --- Resolutions ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDetails {
    pub positive_indicators: u32,
    pub negative_indicators: u32,
    pub neutral_indicators: u32,
    pub weighted_score: f64,
}

/// Change of one indicator over one measure window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    pub indicator_id: IndicatorId,
    pub measure_type: MeasureType,
    pub baseline: f64,
    pub current: f64,
    pub variation: f64,
    pub variation_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub id: Uuid,
    pub decision_id: Uuid,
    pub issue: Issue,
    pub confidence: f64,
    pub details: ResolutionDetails,
    pub variations: Vec<Variation>,
    pub method: ResolutionMethod,
    pub note: Option<String>,
    pub resolved_at: DateTime<Utc>,
}
