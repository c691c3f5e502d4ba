use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use verdict_common::{Decision, MeasureType, Result, VerdictError};
use verdict_store::Store;

use crate::indicators::{due_windows, IndicatorService};
use crate::pipeline::stats::{RefreshItem, RefreshOutcome, RefreshReport};
use crate::traits::IndicatorSource;

const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

/// Fills in every measurement window that has come due for unresolved
/// Decisions.
pub struct IndicatorRefresher {
    store: Arc<dyn Store>,
    source: Arc<dyn IndicatorSource>,
    indicators: IndicatorService,
    timeout: Duration,
}

impl IndicatorRefresher {
    pub fn new(store: Arc<dyn Store>, source: Arc<dyn IndicatorSource>) -> Self {
        Self {
            indicators: IndicatorService::new(store.clone()),
            store,
            source,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run_indicator_refresh(&self) -> Result<RefreshReport> {
        self.run_indicator_refresh_at(Utc::now()).await
    }

    /// Only the initial listing can fail the run; per-window errors are
    /// reported and retried on the next run.
    pub async fn run_indicator_refresh_at(&self, now: DateTime<Utc>) -> Result<RefreshReport> {
        let decisions = self.store.list_unresolved().await?;
        let mut report = RefreshReport {
            decisions_scanned: decisions.len() as u32,
            ..Default::default()
        };

        for decision in &decisions {
            let existing = match self.store.data_points(decision.id).await {
                Ok(points) => points,
                Err(e) => {
                    // Recorded windows are unknown, so every window past its
                    // due date goes into the report as unchecked
                    warn!(decision_id = %decision.id, error = %e, "Failed to load data points");
                    let reason = format!("loading recorded points: {e}");
                    for (indicator_id, measure_type) in due_windows(decision, &[], now) {
                        report.items.push(RefreshItem {
                            decision_id: decision.id,
                            indicator_id,
                            measure_type,
                            outcome: RefreshOutcome::Failed {
                                reason: reason.clone(),
                            },
                        });
                    }
                    continue;
                }
            };

            for (indicator_id, measure_type) in due_windows(decision, &existing, now) {
                let outcome = self.refresh_window(decision, &indicator_id, measure_type).await;
                report.items.push(RefreshItem {
                    decision_id: decision.id,
                    indicator_id,
                    measure_type,
                    outcome,
                });
            }
        }

        info!(
            decisions = report.decisions_scanned,
            recorded = report.recorded(),
            pending = report.pending(),
            failed = report.failed(),
            "Indicator refresh complete"
        );
        Ok(report)
    }

    async fn refresh_window(
        &self,
        decision: &Decision,
        indicator_id: &str,
        measure_type: MeasureType,
    ) -> RefreshOutcome {
        let indicator = match self.indicators.indicator(indicator_id).await {
            Ok(indicator) => indicator,
            Err(e) => {
                warn!(indicator = indicator_id, error = %e, "Indicator not registered");
                return RefreshOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let as_of = measure_type.due_at(decision.date);
        let value = match tokio::time::timeout(self.timeout, self.source.value(&indicator, as_of))
            .await
        {
            Ok(Ok(Some(value))) => value,
            Ok(Ok(None)) => return RefreshOutcome::Pending,
            Ok(Err(e)) => {
                let err = VerdictError::ExternalServiceError {
                    service: "indicator source",
                    message: format!("{e:#}"),
                };
                warn!(indicator = indicator_id, window = %measure_type, error = %err, "Indicator fetch failed");
                return RefreshOutcome::Failed {
                    reason: err.to_string(),
                };
            }
            Err(_) => {
                let err = VerdictError::ExternalServiceTimeout {
                    service: "indicator source",
                    after: self.timeout,
                };
                warn!(indicator = indicator_id, window = %measure_type, error = %err, "Indicator fetch timed out");
                return RefreshOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        match self
            .indicators
            .record(decision.id, indicator_id, measure_type, value, as_of)
            .await
        {
            Ok(_) => RefreshOutcome::Recorded { value },
            Err(e) => RefreshOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{decision, indicator, FaultyStore, FixedIndicatorSource};
    use chrono::Duration as ChronoDuration;
    use verdict_common::DecisionStatus;
    use verdict_store::{DecisionStore, IndicatorStore, MemoryStore};

    #[tokio::test]
    async fn records_due_windows_and_reports_the_rest() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let d = decision("Rate cut", "https://a/1", now - ChronoDuration::days(40), &["gdp", "cpi"]);
        store.insert_if_absent(d.clone()).await.unwrap();
        store.upsert_indicator(&indicator("gdp")).await.unwrap();

        let source = FixedIndicatorSource::new()
            .on("gdp", d.date, 100.0)
            .on("gdp", MeasureType::Days30.due_at(d.date), 103.0);

        let report = IndicatorRefresher::new(store.clone(), Arc::new(source))
            .run_indicator_refresh_at(now)
            .await
            .unwrap();

        assert_eq!(report.decisions_scanned, 1);
        assert_eq!(report.recorded(), 2);
        // cpi is attached but never registered
        assert_eq!(report.failed(), 2);

        let points = store.data_points(d.id).await.unwrap();
        assert_eq!(points.len(), 2);
        let stored = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DecisionStatus::Tracking);
    }

    #[tokio::test]
    async fn missing_observation_stays_pending() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let d = decision("Fresh", "https://a/2", now, &["gdp"]);
        store.insert_if_absent(d.clone()).await.unwrap();
        store.upsert_indicator(&indicator("gdp")).await.unwrap();

        let report = IndicatorRefresher::new(store.clone(), Arc::new(FixedIndicatorSource::new()))
            .run_indicator_refresh_at(now)
            .await
            .unwrap();

        assert_eq!(report.pending(), 1);
        let stored = store.get(d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DecisionStatus::Announced);
    }

    #[tokio::test]
    async fn source_errors_are_per_window() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let d = decision("Tariffs", "https://a/3", now, &["gdp", "cpi"]);
        store.insert_if_absent(d.clone()).await.unwrap();
        store.upsert_indicator(&indicator("gdp")).await.unwrap();
        store.upsert_indicator(&indicator("cpi")).await.unwrap();

        let source = FixedIndicatorSource::new().failing("gdp").on("cpi", d.date, 4.1);
        let report = IndicatorRefresher::new(store.clone(), Arc::new(source))
            .run_indicator_refresh_at(now)
            .await
            .unwrap();

        assert_eq!(report.recorded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(matches!(
            &report.items[0].outcome,
            RefreshOutcome::Failed { reason } if reason.contains("indicator source")
        ));
    }

    #[tokio::test]
    async fn unreadable_points_are_reported_per_decision() {
        let now = Utc::now();
        let broken = decision("Broken", "https://a/4", now - ChronoDuration::days(40), &["gdp"]);
        let healthy = decision("Healthy", "https://a/5", now, &["gdp"]);
        let store = Arc::new(FaultyStore::new().failing_data_points(broken.id));
        store.inner().insert_if_absent(broken.clone()).await.unwrap();
        store.inner().insert_if_absent(healthy.clone()).await.unwrap();
        store.inner().upsert_indicator(&indicator("gdp")).await.unwrap();

        let report = IndicatorRefresher::new(store.clone(), Arc::new(FixedIndicatorSource::new()))
            .run_indicator_refresh_at(now)
            .await
            .unwrap();

        assert_eq!(report.decisions_scanned, 2);
        // Baseline and 30d for the broken decision; the healthy one still runs
        assert_eq!(report.failed(), 2);
        assert_eq!(report.pending(), 1);
        for item in &report.items {
            if item.decision_id == broken.id {
                assert!(matches!(
                    &item.outcome,
                    RefreshOutcome::Failed { reason } if reason.contains("recorded points")
                ));
            }
        }
        assert!(report.to_string().contains(&broken.id.to_string()));
    }

    #[tokio::test]
    async fn listing_failure_fails_the_run() {
        let refresher = IndicatorRefresher::new(
            Arc::new(crate::testing::FailingStore),
            Arc::new(FixedIndicatorSource::new()),
        );
        assert!(refresher.run_indicator_refresh().await.is_err());
    }
}
