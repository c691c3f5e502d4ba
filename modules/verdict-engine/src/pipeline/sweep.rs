use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use verdict_common::{Result, VerdictError};
use verdict_store::Store;

use crate::pipeline::stats::{SweepItem, SweepOutcome, SweepReport};
use crate::resolution::ResolutionEngine;

/// Resolves every unresolved Decision that has reached maturity.
pub struct ResolutionSweeper {
    store: Arc<dyn Store>,
    engine: ResolutionEngine,
}

impl ResolutionSweeper {
    pub fn new(store: Arc<dyn Store>, engine: ResolutionEngine) -> Self {
        Self { store, engine }
    }

    pub async fn run_resolution_sweep(&self) -> Result<SweepReport> {
        self.run_resolution_sweep_at(Utc::now()).await
    }

    pub async fn run_resolution_sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let decisions = self.store.list_unresolved().await?;
        let mut report = SweepReport {
            unresolved: decisions.len() as u32,
            ..Default::default()
        };

        for decision in &decisions {
            if !self.engine.is_mature(decision, now) {
                report.not_due += 1;
                continue;
            }

            let outcome = match self.engine.resolve(decision).await {
                Ok(resolution) => SweepOutcome::Resolved {
                    issue: resolution.issue,
                    confidence: resolution.confidence,
                },
                Err(VerdictError::NoIndicators(_)) => {
                    info!(decision_id = %decision.id, "No indicators attached, skipping");
                    SweepOutcome::NoIndicators
                }
                Err(e) => {
                    warn!(decision_id = %decision.id, error = %e, "Resolution failed");
                    SweepOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            report.items.push(SweepItem {
                decision_id: decision.id,
                title: decision.title.clone(),
                outcome,
            });
        }

        info!(
            unresolved = report.unresolved,
            not_due = report.not_due,
            resolved = report.resolved(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Resolution sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{data_point, decision};
    use chrono::Duration;
    use verdict_common::{DecisionStatus, Issue, MeasureType, ResolutionPolicy};
    use verdict_store::{DecisionStore, IndicatorStore, MemoryStore};

    fn sweeper(store: Arc<MemoryStore>) -> ResolutionSweeper {
        let engine = ResolutionEngine::new(store.clone(), ResolutionPolicy::default());
        ResolutionSweeper::new(store, engine)
    }

    #[tokio::test]
    async fn resolves_only_mature_decisions() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());

        let mature = decision("Old reform", "https://a/1", now - Duration::days(400), &["gdp"]);
        store.insert_if_absent(mature.clone()).await.unwrap();
        for (window, value) in [(MeasureType::Baseline, 100.0), (MeasureType::Days365, 120.0)] {
            store
                .upsert_data_point(&data_point(mature.id, "gdp", window, value))
                .await
                .unwrap();
        }

        let young = decision("New reform", "https://a/2", now - Duration::days(10), &["gdp"]);
        store.insert_if_absent(young.clone()).await.unwrap();

        let report = sweeper(store.clone()).run_resolution_sweep_at(now).await.unwrap();

        assert_eq!(report.unresolved, 2);
        assert_eq!(report.not_due, 1);
        assert_eq!(report.resolved(), 1);
        assert_eq!(report.items[0].decision_id, mature.id);

        let stored = store.get(mature.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DecisionStatus::Resolved);
        let stored = store.get(young.id).await.unwrap().unwrap();
        assert_ne!(stored.status, DecisionStatus::Resolved);
    }

    #[tokio::test]
    async fn decisions_without_indicators_are_skipped() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let bare = decision("Bare decision", "https://a/3", now - Duration::days(400), &[]);
        store.insert_if_absent(bare.clone()).await.unwrap();

        let report = sweeper(store.clone()).run_resolution_sweep_at(now).await.unwrap();

        assert_eq!(report.skipped(), 1);
        assert_eq!(report.items[0].outcome, SweepOutcome::NoIndicators);
        let stored = store.get(bare.id).await.unwrap().unwrap();
        assert_ne!(stored.status, DecisionStatus::Resolved);
    }

    #[tokio::test]
    async fn mature_decision_without_data_fails_with_zero_confidence() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let d = decision("Silent decision", "https://a/4", now - Duration::days(366), &["gdp"]);
        store.insert_if_absent(d).await.unwrap();

        let report = sweeper(store).run_resolution_sweep_at(now).await.unwrap();

        assert_eq!(
            report.items[0].outcome,
            SweepOutcome::Resolved {
                issue: Issue::Fails,
                confidence: 0.0,
            }
        );
    }
}
