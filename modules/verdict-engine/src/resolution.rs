//! Outcome resolution from indicator variations.
//!
//! Each `(indicator, window)` pair with both a baseline and a window value is
//! scored on its own, then the scores are combined with the window weights of
//! `ResolutionPolicy`. A Decision with no usable pairs resolves to `fails` with
//! zero confidence.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use verdict_common::{
    Decision, DecisionPatch, DecisionStatus, IndicatorDataPoint, Issue, MeasureType, Resolution,
    ResolutionDetails, ResolutionMethod, ResolutionPolicy, Result, Variation, VerdictError,
};
use verdict_store::Store;

/// Variations for every attached indicator, in indicator then window order.
/// Points for indicators not attached to the Decision are ignored.
pub fn compute_variations(
    indicator_ids: &[String],
    points: &[IndicatorDataPoint],
) -> Vec<Variation> {
    let by_key: HashMap<(&str, MeasureType), f64> = points
        .iter()
        .map(|p| ((p.indicator_id.as_str(), p.measure_type), p.value))
        .collect();

    let mut variations = Vec::new();
    for indicator_id in indicator_ids {
        let Some(&baseline) = by_key.get(&(indicator_id.as_str(), MeasureType::Baseline)) else {
            continue;
        };
        if !baseline.is_finite() {
            continue;
        }
        for window in MeasureType::POST_BASELINE {
            let Some(&current) = by_key.get(&(indicator_id.as_str(), window)) else {
                continue;
            };
            let variation_percent = if baseline == 0.0 {
                0.0
            } else {
                (current - baseline) * 100.0 / baseline
            };
            // Rows written before values were validated
            if !current.is_finite() || !variation_percent.is_finite() {
                continue;
            }
            variations.push(Variation {
                indicator_id: indicator_id.clone(),
                measure_type: window,
                baseline,
                current,
                variation: current - baseline,
                variation_percent,
            });
        }
    }
    variations
}

/// Score of one pair: 0 below the significance threshold, otherwise
/// `multiplier × variation%` bounded by ±max.
pub fn score_variation(variation_percent: f64, policy: &ResolutionPolicy) -> f64 {
    if variation_percent.abs() < policy.significance_threshold_pct {
        0.0
    } else if variation_percent > 0.0 {
        (variation_percent * policy.score_multiplier).min(policy.max_indicator_score)
    } else {
        (variation_percent * policy.score_multiplier).max(-policy.max_indicator_score)
    }
}

/// Weighted aggregate over all pairs, neutral pairs included in the
/// denominator. `None` when no pair carries weight.
pub fn weighted_details(
    variations: &[Variation],
    policy: &ResolutionPolicy,
) -> Option<ResolutionDetails> {
    let mut details = ResolutionDetails::default();
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for variation in variations {
        let score = score_variation(variation.variation_percent, policy);
        if score > 0.0 {
            details.positive_indicators += 1;
        } else if score < 0.0 {
            details.negative_indicators += 1;
        } else {
            details.neutral_indicators += 1;
        }
        let weight = policy.window_weight(variation.measure_type);
        weighted_sum += score * weight;
        weight_total += weight;
    }

    if weight_total <= 0.0 {
        return None;
    }
    details.weighted_score = weighted_sum / weight_total;
    Some(details)
}

/// Map a weighted score to an outcome and confidence.
pub fn classify(weighted_score: f64, policy: &ResolutionPolicy) -> (Issue, f64) {
    let magnitude = weighted_score.abs();
    if weighted_score >= policy.classification_boundary {
        (Issue::Works, (policy.base_confidence + magnitude).min(100.0))
    } else if weighted_score <= -policy.classification_boundary {
        (Issue::Fails, (policy.base_confidence + magnitude).min(100.0))
    } else {
        (
            Issue::Partial,
            (policy.base_confidence - magnitude).max(policy.min_partial_confidence),
        )
    }
}

pub struct ResolutionEngine {
    store: Arc<dyn Store>,
    policy: ResolutionPolicy,
}

impl ResolutionEngine {
    pub fn new(store: Arc<dyn Store>, policy: ResolutionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Whether a Decision has been tracked long enough to resolve.
    pub fn is_mature(&self, decision: &Decision, now: DateTime<Utc>) -> bool {
        now >= decision.date + chrono::Duration::days(self.policy.maturity_days)
    }

    /// Compute and persist the Resolution for `decision`. Re-running updates
    /// the same row.
    pub async fn resolve(&self, decision: &Decision) -> Result<Resolution> {
        if decision.indicator_ids.is_empty() {
            return Err(VerdictError::NoIndicators(decision.id));
        }

        let points = self.store.data_points(decision.id).await?;
        let variations = compute_variations(&decision.indicator_ids, &points);

        let (issue, confidence, details) = match weighted_details(&variations, &self.policy) {
            Some(details) => {
                let (issue, confidence) = classify(details.weighted_score, &self.policy);
                (issue, confidence, details)
            }
            None => (Issue::Fails, 0.0, ResolutionDetails::default()),
        };

        let resolution = Resolution {
            id: Uuid::new_v4(),
            decision_id: decision.id,
            issue,
            confidence,
            details,
            variations,
            method: ResolutionMethod::WeightedIndicators,
            note: None,
            resolved_at: Utc::now(),
        };

        let stored = self.persist(&resolution).await?;
        info!(
            decision_id = %decision.id,
            issue = %stored.issue,
            confidence = stored.confidence,
            weighted_score = stored.details.weighted_score,
            pairs = stored.variations.len(),
            "Decision resolved"
        );
        Ok(stored)
    }

    pub async fn resolve_by_id(&self, decision_id: Uuid) -> Result<Resolution> {
        let decision = self
            .store
            .get(decision_id)
            .await?
            .ok_or_else(|| VerdictError::decision_not_found(decision_id))?;
        self.resolve(&decision).await
    }

    /// Record an operator-supplied outcome. Confidence is clamped to [0, 100].
    pub async fn resolve_manual(
        &self,
        decision_id: Uuid,
        issue: Issue,
        confidence: f64,
        note: Option<String>,
    ) -> Result<Resolution> {
        if self.store.get(decision_id).await?.is_none() {
            return Err(VerdictError::decision_not_found(decision_id));
        }

        let resolution = Resolution {
            id: Uuid::new_v4(),
            decision_id,
            issue,
            confidence: confidence.clamp(0.0, 100.0),
            details: ResolutionDetails::default(),
            variations: Vec::new(),
            method: ResolutionMethod::Manual,
            note,
            resolved_at: Utc::now(),
        };

        let stored = self.persist(&resolution).await?;
        info!(decision_id = %decision_id, issue = %stored.issue, "Manual resolution recorded");
        Ok(stored)
    }

    async fn persist(&self, resolution: &Resolution) -> Result<Resolution> {
        let stored = self.store.upsert(resolution).await?;
        self.store
            .patch(
                resolution.decision_id,
                &DecisionPatch::status(DecisionStatus::Resolved),
            )
            .await?;
        Ok(stored)
    }
}
