use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use verdict_common::{Decision, DecisionPatch, Indicator, IndicatorDataPoint, Resolution};

use crate::error::Result;

/// Outcome of an atomic insert keyed by `content_hash`.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(Decision),
    /// Another writer got there first; this is the stored Decision.
    Existing(Decision),
}

impl InsertOutcome {
    pub fn decision(&self) -> &Decision {
        match self {
            InsertOutcome::Inserted(d) | InsertOutcome::Existing(d) => d,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

// ---------------------------------------------------------------------------
// DecisionStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Decision>>;

    /// Index-backed exact lookup.
    async fn get_by_hash(&self, hash: &str) -> Result<Option<Decision>>;

    /// Decisions created at or after `since`, newest first.
    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>>;

    /// Insert unless a Decision with the same `content_hash` exists. The check
    /// and the write are one atomic step.
    async fn insert_if_absent(&self, decision: Decision) -> Result<InsertOutcome>;

    /// Apply a partial update and return the stored result.
    async fn patch(&self, id: Uuid, patch: &DecisionPatch) -> Result<Decision>;

    /// Decisions not yet resolved, oldest event date first.
    async fn list_unresolved(&self) -> Result<Vec<Decision>>;
}

// ---------------------------------------------------------------------------
// IndicatorStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IndicatorStore: Send + Sync {
    async fn get_indicator(&self, id: &str) -> Result<Option<Indicator>>;

    async fn upsert_indicator(&self, indicator: &Indicator) -> Result<()>;

    async fn data_points(&self, decision_id: Uuid) -> Result<Vec<IndicatorDataPoint>>;

    /// At most one point per (decision, indicator, measure type); later writes
    /// replace value and date.
    async fn upsert_data_point(&self, point: &IndicatorDataPoint) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ResolutionStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ResolutionStore: Send + Sync {
    async fn get_by_decision(&self, decision_id: Uuid) -> Result<Option<Resolution>>;

    /// Insert, or update the existing row for `resolution.decision_id` keeping
    /// its id. Returns the stored row.
    async fn upsert(&self, resolution: &Resolution) -> Result<Resolution>;

    async fn count_for_decision(&self, decision_id: Uuid) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Store: everything the engine needs behind one object
// ---------------------------------------------------------------------------

pub trait Store: DecisionStore + IndicatorStore + ResolutionStore {}

impl<T> Store for T where T: DecisionStore + IndicatorStore + ResolutionStore {}
