use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use verdict_common::{
    Decision, DecisionPatch, DecisionStatus, Indicator, IndicatorDataPoint, IndicatorId,
    MeasureType, Result, VerdictError,
};
use verdict_store::Store;

/// Windows that have come due for `decision` by `now` and are not yet
/// recorded, per attached indicator, in indicator then window order.
pub fn due_windows(
    decision: &Decision,
    existing: &[IndicatorDataPoint],
    now: DateTime<Utc>,
) -> Vec<(IndicatorId, MeasureType)> {
    let recorded: HashSet<(&str, MeasureType)> = existing
        .iter()
        .filter(|p| p.decision_id == decision.id)
        .map(|p| (p.indicator_id.as_str(), p.measure_type))
        .collect();

    let mut due = Vec::new();
    for indicator_id in &decision.indicator_ids {
        for window in MeasureType::ALL {
            if window.due_at(decision.date) <= now
                && !recorded.contains(&(indicator_id.as_str(), window))
            {
                due.push((indicator_id.clone(), window));
            }
        }
    }
    due
}

pub struct IndicatorService {
    store: Arc<dyn Store>,
}

impl IndicatorService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register an indicator. An existing definition is kept as is and
    /// returned, since data points may already reference it.
    pub async fn register(&self, indicator: &Indicator) -> Result<Indicator> {
        if let Some(existing) = self.store.get_indicator(&indicator.id).await? {
            debug!(id = existing.id.as_str(), "Indicator already registered");
            return Ok(existing);
        }
        self.store.upsert_indicator(indicator).await?;
        info!(id = indicator.id.as_str(), source = indicator.source_kind.as_str(), "Indicator registered");
        Ok(indicator.clone())
    }

    pub async fn indicator(&self, id: &str) -> Result<Indicator> {
        self.store
            .get_indicator(id)
            .await?
            .ok_or_else(|| VerdictError::indicator_not_found(id))
    }

    /// Upsert one measurement. The first recorded point moves the Decision
    /// from `announced` to `tracking`.
    pub async fn record(
        &self,
        decision_id: Uuid,
        indicator_id: &str,
        measure_type: MeasureType,
        value: f64,
        date: DateTime<Utc>,
    ) -> Result<IndicatorDataPoint> {
        if !value.is_finite() {
            return Err(VerdictError::InvalidMeasurement {
                indicator: indicator_id.to_string(),
                value,
            });
        }

        let decision = self
            .store
            .get(decision_id)
            .await?
            .ok_or_else(|| VerdictError::decision_not_found(decision_id))?;

        if !decision.indicator_ids.iter().any(|id| id == indicator_id) {
            return Err(VerdictError::indicator_not_found(indicator_id));
        }

        let point = IndicatorDataPoint {
            decision_id,
            indicator_id: indicator_id.to_string(),
            measure_type,
            value,
            date,
        };
        self.store.upsert_data_point(&point).await?;

        if decision.status == DecisionStatus::Announced {
            self.store
                .patch(decision_id, &DecisionPatch::status(DecisionStatus::Tracking))
                .await?;
            info!(decision_id = %decision_id, "Decision now tracking");
        }

        debug!(
            decision_id = %decision_id,
            indicator = indicator_id,
            window = %measure_type,
            value,
            "Data point recorded"
        );
        Ok(point)
    }
}
