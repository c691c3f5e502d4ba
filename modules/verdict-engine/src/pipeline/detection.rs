use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use verdict_common::policy::SEMANTIC_TIMEOUT_SECS;
use verdict_common::text::main_topic;
use verdict_common::{
    ContentRecord, Decision, DedupPolicy, DetectionPolicy, FileConfig, RankingPolicy, Result,
    VerdictError, Vocabulary,
};
use verdict_store::{InsertOutcome, Store};

use crate::cluster::{cluster_with_threshold, EventCluster};
use crate::dedup::{DedupTier, DeduplicationService};
use crate::pipeline::stats::{DetectionItem, DetectionOutcome, DetectionReport};
use crate::ranking::{rank, recent_topics, ScoredCluster, SentimentFilter};
use crate::traits::{Classifier, ContentFeed, EventSynthesizer};

/// Policy bundle for a detection run.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub vocabulary: Vocabulary,
    pub dedup: DedupPolicy,
    pub ranking: RankingPolicy,
    pub detection: DetectionPolicy,
    /// Per-call bound on sentiment classification.
    pub classifier_timeout: Duration,
}

impl DetectionSettings {
    pub fn from_config(config: &FileConfig, classifier_timeout: Duration) -> Self {
        Self {
            vocabulary: config.vocabulary.clone(),
            dedup: config.dedup.clone(),
            ranking: config.ranking.clone(),
            detection: config.detection.clone(),
            classifier_timeout,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self::from_config(
            &FileConfig::default(),
            Duration::from_secs(SEMANTIC_TIMEOUT_SECS),
        )
    }
}

/// Feeds → clusters → ranking → dedup → synthesis → atomic insert.
pub struct Detector {
    store: Arc<dyn Store>,
    feeds: Vec<Arc<dyn ContentFeed>>,
    classifier: Option<Arc<dyn Classifier>>,
    synthesizer: Arc<dyn EventSynthesizer>,
    dedup: DeduplicationService,
    settings: DetectionSettings,
}

impl Detector {
    pub fn new(
        store: Arc<dyn Store>,
        synthesizer: Arc<dyn EventSynthesizer>,
        settings: DetectionSettings,
    ) -> Self {
        let dedup = DeduplicationService::new(
            store.clone(),
            settings.vocabulary.clone(),
            settings.dedup.clone(),
        );
        Self {
            store,
            feeds: Vec::new(),
            classifier: None,
            synthesizer,
            dedup,
            settings,
        }
    }

    pub fn with_feed(mut self, feed: Arc<dyn ContentFeed>) -> Self {
        self.feeds.push(feed);
        self
    }

    /// Enables Tier-3 dedup and the sentiment filter.
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.dedup = self.dedup.with_classifier(classifier.clone());
        self.classifier = Some(classifier);
        self
    }

    pub async fn run_detection(&self) -> DetectionReport {
        self.run_detection_at(Utc::now()).await
    }

    /// One full run. Never fails as a whole: unavailable feeds and per-cluster
    /// errors are recorded in the report.
    pub async fn run_detection_at(&self, now: DateTime<Utc>) -> DetectionReport {
        let mut report = DetectionReport::default();

        // 1. Fetch feeds concurrently
        let records = self.fetch_feeds(&mut report).await;
        report.records = records.len() as u32;

        // 2. Cluster
        let clusters = cluster_with_threshold(
            records,
            &self.settings.vocabulary,
            self.settings.ranking.min_shared_keywords,
        );
        report.clusters = clusters.len() as u32;
        info!(records = report.records, clusters = report.clusters, "Clustering complete");

        // 3. Rank
        let topics = match recent_topics(self.store.as_ref(), now, &self.settings.ranking).await {
            Ok(topics) => topics,
            Err(e) => {
                warn!(error = %e, "Failed to load recent topics, skipping diversity penalty");
                Vec::new()
            }
        };
        let ranked = rank(clusters, &topics, now, &self.settings.ranking);

        // 4. Walk the ranking: sentiment gate, then dedup, synthesize and
        //    insert until the quota of created Decisions is met
        let filter = match (self.settings.detection.target_sentiment, &self.classifier) {
            (Some(target), Some(classifier)) => Some(SentimentFilter::new(
                target,
                classifier.as_ref(),
                self.settings.classifier_timeout,
            )),
            (Some(_), None) => {
                warn!("Target sentiment set but no classifier configured, skipping filter");
                None
            }
            (None, _) => None,
        };

        let quota = self.settings.detection.quota;
        let mut created = 0usize;
        let mut matched = 0usize;
        let mut passed_over = Vec::new();
        for scored in &ranked {
            if created >= quota {
                break;
            }
            if let Some(filter) = &filter {
                if !filter.matches(scored).await {
                    passed_over.push(scored);
                    continue;
                }
                matched += 1;
            }
            created += self.take(scored, now, &mut report).await;
        }

        // Too few sentiment matches: fill the rest from the unfiltered ranking
        let needed = quota.div_ceil(2);
        if filter.is_some() && created < quota && matched < needed {
            info!(
                matched,
                needed,
                "Too few clusters match target sentiment, using unfiltered ranking"
            );
            for scored in passed_over {
                if created >= quota {
                    break;
                }
                created += self.take(scored, now, &mut report).await;
            }
        }

        info!(
            created = report.created(),
            duplicates = report.duplicates(),
            failed = report.failed(),
            "Detection run complete"
        );
        report
    }

    /// Process one selected cluster into the report. Returns 1 when a
    /// Decision was created.
    async fn take(
        &self,
        scored: &ScoredCluster,
        now: DateTime<Utc>,
        report: &mut DetectionReport,
    ) -> usize {
        report.selected += 1;
        let Some(item) = self.process_cluster(&scored.cluster, now).await else {
            return 0;
        };
        let created = matches!(item.outcome, DetectionOutcome::Created { .. });
        report.items.push(item);
        usize::from(created)
    }

    async fn fetch_feeds(&self, report: &mut DetectionReport) -> Vec<ContentRecord> {
        let limit = Duration::from_secs(self.settings.detection.feed_timeout_secs);
        let results: Vec<_> = stream::iter(self.feeds.iter().map(|feed| async move {
            let result = match tokio::time::timeout(limit, feed.fetch()).await {
                Ok(Ok(records)) => Ok(records),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err(format!("timed out after {}s", limit.as_secs())),
            };
            (feed.name().to_string(), result)
        }))
        .buffer_unordered(self.settings.detection.feed_concurrency.max(1))
        .collect()
        .await;

        let mut records = Vec::new();
        for (name, result) in results {
            match result {
                Ok(batch) => {
                    report.feeds_fetched += 1;
                    records.extend(batch);
                }
                Err(reason) => {
                    let err = VerdictError::FeedUnavailable {
                        feed: name.clone(),
                        reason: reason.clone(),
                    };
                    warn!(feed = name.as_str(), error = %err, "Feed skipped");
                    report.feeds_failed.push((name, reason));
                }
            }
        }
        records
    }

    async fn process_cluster(
        &self,
        cluster: &EventCluster,
        now: DateTime<Utc>,
    ) -> Option<DetectionItem> {
        let rep = cluster.representative()?;
        let item = |outcome| DetectionItem {
            title: rep.title.clone(),
            source_url: rep.url.clone(),
            outcome,
        };

        let check = self
            .dedup
            .check_duplicate_at(&rep.title, &rep.url, rep.summary.as_deref(), now)
            .await;
        if let (true, Some(matched), Some(tier)) = (check.is_duplicate, &check.matched, check.tier) {
            return Some(item(DetectionOutcome::Duplicate {
                matched: matched.id,
                tier,
            }));
        }

        let draft = match self.synthesizer.synthesize(cluster).await {
            Ok(draft) => draft,
            Err(e) => {
                warn!(title = rep.title.as_str(), error = %e, "Event synthesis failed");
                return Some(item(DetectionOutcome::Failed {
                    reason: format!("synthesis: {e:#}"),
                }));
            }
        };

        let topic = cluster
            .main_topic
            .clone()
            .or_else(|| main_topic(&draft.title, &self.settings.vocabulary));
        let decision = Decision::from_draft(draft, topic, now);

        Some(match self.insert(decision).await {
            Ok(InsertOutcome::Inserted(d)) => {
                info!(id = %d.id, title = d.title.as_str(), "Decision created");
                item(DetectionOutcome::Created { decision_id: d.id })
            }
            Ok(InsertOutcome::Existing(d)) => {
                info!(id = %d.id, "Concurrent run already created this Decision");
                item(DetectionOutcome::Duplicate {
                    matched: d.id,
                    tier: DedupTier::ExactHash,
                })
            }
            Err(e) => {
                warn!(title = rep.title.as_str(), error = %e, "Failed to store Decision");
                item(DetectionOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        })
    }

    async fn insert(&self, decision: Decision) -> Result<InsertOutcome> {
        Ok(self.store.insert_if_absent(decision).await?)
    }
}
