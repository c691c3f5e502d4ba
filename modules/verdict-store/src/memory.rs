// In-memory store. One lock guards all maps, so check-and-insert on
// content_hash is atomic the same way the Postgres unique index is.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use verdict_common::{
    Decision, DecisionPatch, DecisionStatus, Indicator, IndicatorDataPoint, MeasureType,
    Resolution,
};

use crate::error::{Result, StoreError};
use crate::traits::{DecisionStore, IndicatorStore, InsertOutcome, ResolutionStore};

#[derive(Default)]
struct Inner {
    decisions: HashMap<Uuid, Decision>,
    /// content_hash → decision id
    hash_index: HashMap<String, Uuid>,
    indicators: HashMap<String, Indicator>,
    points: HashMap<(Uuid, String, MeasureType), IndicatorDataPoint>,
    /// decision id → resolution
    resolutions: HashMap<Uuid, Resolution>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    pub fn decision_count(&self) -> usize {
        self.lock().map(|inner| inner.decisions.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Decision>> {
        Ok(self.lock()?.decisions.get(&id).cloned())
    }

    async fn get_by_hash(&self, hash: &str) -> Result<Option<Decision>> {
        let inner = self.lock()?;
        Ok(inner
            .hash_index
            .get(hash)
            .and_then(|id| inner.decisions.get(id))
            .cloned())
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> Result<Vec<Decision>> {
        let inner = self.lock()?;
        let mut recent: Vec<Decision> = inner
            .decisions
            .values()
            .filter(|d| d.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(recent)
    }

    async fn insert_if_absent(&self, decision: Decision) -> Result<InsertOutcome> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .hash_index
            .get(&decision.content_hash)
            .and_then(|id| inner.decisions.get(id))
        {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        inner
            .hash_index
            .insert(decision.content_hash.clone(), decision.id);
        inner.decisions.insert(decision.id, decision.clone());
        Ok(InsertOutcome::Inserted(decision))
    }

    async fn patch(&self, id: Uuid, patch: &DecisionPatch) -> Result<Decision> {
        let mut inner = self.lock()?;
        let decision = inner
            .decisions
            .get_mut(&id)
            .ok_or(StoreError::DecisionNotFound(id))?;
        patch.apply(decision);
        Ok(decision.clone())
    }

    async fn list_unresolved(&self) -> Result<Vec<Decision>> {
        let inner = self.lock()?;
        let mut open: Vec<Decision> = inner
            .decisions
            .values()
            .filter(|d| d.status != DecisionStatus::Resolved)
            .cloned()
            .collect();
        open.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(open)
    }
}

#[async_trait]
impl IndicatorStore for MemoryStore {
    async fn get_indicator(&self, id: &str) -> Result<Option<Indicator>> {
        Ok(self.lock()?.indicators.get(id).cloned())
    }

    async fn upsert_indicator(&self, indicator: &Indicator) -> Result<()> {
        self.lock()?
            .indicators
            .insert(indicator.id.clone(), indicator.clone());
        Ok(())
    }

    async fn data_points(&self, decision_id: Uuid) -> Result<Vec<IndicatorDataPoint>> {
        let inner = self.lock()?;
        let mut points: Vec<IndicatorDataPoint> = inner
            .points
            .values()
            .filter(|p| p.decision_id == decision_id)
            .cloned()
            .collect();
        points.sort_by(|a, b| {
            a.indicator_id
                .cmp(&b.indicator_id)
                .then(a.measure_type.cmp(&b.measure_type))
        });
        Ok(points)
    }

    async fn upsert_data_point(&self, point: &IndicatorDataPoint) -> Result<()> {
        self.lock()?.points.insert(
            (point.decision_id, point.indicator_id.clone(), point.measure_type),
            point.clone(),
        );
        Ok(())
    }
}

#[async_trait]
impl ResolutionStore for MemoryStore {
    async fn get_by_decision(&self, decision_id: Uuid) -> Result<Option<Resolution>> {
        Ok(self.lock()?.resolutions.get(&decision_id).cloned())
    }

    async fn upsert(&self, resolution: &Resolution) -> Result<Resolution> {
        let mut inner = self.lock()?;
        let mut stored = resolution.clone();
        if let Some(existing) = inner.resolutions.get(&resolution.decision_id) {
            stored.id = existing.id;
        }
        inner
            .resolutions
            .insert(resolution.decision_id, stored.clone());
        Ok(stored)
    }

    async fn count_for_decision(&self, decision_id: Uuid) -> Result<usize> {
        Ok(usize::from(
            self.lock()?.resolutions.contains_key(&decision_id),
        ))
    }
}
