//! Three-tier duplicate detection for incoming events.
//!
//! Tier 1 looks up the content hash. Tier 2 scans the last few days of
//! Decisions for matching titles, URLs or overlapping keywords. Tier 3 asks the
//! classifier about the most recent candidates, and only runs when a
//! description is supplied and a classifier is configured.
//!
//! A check never fails: storage and classifier errors are logged and the tier
//! degrades to "no match".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use verdict_common::text::{extract_keywords, jaccard, main_topic, normalize_title};
use verdict_common::{content_hash, Decision, DedupPolicy, VerdictError, Vocabulary};
use verdict_store::Store;

use crate::traits::Classifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupTier {
    ExactHash,
    Textual,
    Semantic,
}

impl DedupTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupTier::ExactHash => "exact_hash",
            DedupTier::Textual => "textual",
            DedupTier::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for DedupTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched: Option<Decision>,
    pub tier: Option<DedupTier>,
}

impl DuplicateCheck {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            matched: None,
            tier: None,
        }
    }

    fn matched(decision: Decision, tier: DedupTier) -> Self {
        Self {
            is_duplicate: true,
            matched: Some(decision),
            tier: Some(tier),
        }
    }
}

pub struct DeduplicationService {
    store: Arc<dyn Store>,
    classifier: Option<Arc<dyn Classifier>>,
    vocab: Vocabulary,
    policy: DedupPolicy,
}

impl DeduplicationService {
    pub fn new(store: Arc<dyn Store>, vocab: Vocabulary, policy: DedupPolicy) -> Self {
        Self {
            store,
            classifier: None,
            vocab,
            policy,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub async fn check_duplicate(
        &self,
        title: &str,
        source_url: &str,
        description: Option<&str>,
    ) -> DuplicateCheck {
        self.check_duplicate_at(title, source_url, description, Utc::now())
            .await
    }

    pub async fn check_duplicate_at(
        &self,
        title: &str,
        source_url: &str,
        description: Option<&str>,
        now: DateTime<Utc>,
    ) -> DuplicateCheck {
        // Tier 1: exact hash
        let hash = content_hash(title, source_url);
        match self.store.get_by_hash(&hash).await {
            Ok(Some(existing)) => {
                debug!(hash = hash.as_str(), id = %existing.id, "dedup: exact hash match");
                return DuplicateCheck::matched(existing, DedupTier::ExactHash);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "dedup: hash lookup failed, falling back to text scan"),
        }

        // Tier 2: bounded textual scan, newest first
        let since = now - chrono::Duration::days(self.policy.window_days);
        let candidates = match self.store.recent_since(since).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(error = %e, "dedup: recent scan failed, treating as no candidates");
                Vec::new()
            }
        };

        if let Some(existing) = self.textual_match(title, source_url, &candidates) {
            debug!(id = %existing.id, "dedup: textual match");
            return DuplicateCheck::matched(existing.clone(), DedupTier::Textual);
        }

        // Tier 3: semantic judgment over the most recent candidates
        if let (Some(description), Some(classifier)) = (description, &self.classifier) {
            if let Some(existing) = self
                .semantic_match(classifier.as_ref(), title, description, &candidates)
                .await
            {
                info!(id = %existing.id, title, "dedup: semantic match");
                return DuplicateCheck::matched(existing.clone(), DedupTier::Semantic);
            }
        }

        DuplicateCheck::unique()
    }

    fn textual_match<'a>(
        &self,
        title: &str,
        source_url: &str,
        candidates: &'a [Decision],
    ) -> Option<&'a Decision> {
        let normalized = normalize_title(title);
        let url = source_url.trim().to_lowercase();
        if let Some(exact) = candidates.iter().find(|c| {
            normalize_title(&c.title) == normalized || c.source_url.trim().to_lowercase() == url
        }) {
            return Some(exact);
        }

        let keywords = extract_keywords(title, &self.vocab);
        let topic = main_topic(title, &self.vocab);

        candidates.iter().find(|candidate| {
            let theirs = extract_keywords(&candidate.title, &self.vocab);
            let similarity = jaccard(&keywords, &theirs);
            let same_topic = match (&topic, main_topic(&candidate.title, &self.vocab)) {
                (Some(ours), Some(their_topic)) => *ours == their_topic,
                _ => false,
            };
            (same_topic && similarity > self.policy.topic_match_similarity)
                || similarity > self.policy.strong_similarity
        })
    }

    /// Judgments run concurrently, each under its own timeout. The first
    /// confirmed candidate in recency order wins; errors and timeouts count as
    /// "not a duplicate".
    async fn semantic_match<'a>(
        &self,
        classifier: &dyn Classifier,
        title: &str,
        description: &str,
        candidates: &'a [Decision],
    ) -> Option<&'a Decision> {
        let limit = Duration::from_secs(self.policy.semantic_timeout_secs);
        let ours = describe(title, Some(description));
        let batch = &candidates[..candidates.len().min(self.policy.semantic_candidate_limit)];

        let judgments = join_all(batch.iter().map(|candidate| {
            let theirs = describe(&candidate.title, candidate.summary.as_deref());
            let ours = ours.as_str();
            async move {
                match tokio::time::timeout(limit, classifier.judge_duplicate(ours, &theirs)).await
                {
                    Ok(Ok(same)) => same,
                    Ok(Err(e)) => {
                        let err = VerdictError::ExternalServiceError {
                            service: "classifier",
                            message: e.to_string(),
                        };
                        warn!(id = %candidate.id, error = %err, "dedup: semantic judgment failed");
                        false
                    }
                    Err(_) => {
                        let err = VerdictError::ExternalServiceTimeout {
                            service: "classifier",
                            after: limit,
                        };
                        warn!(id = %candidate.id, error = %err, "dedup: semantic judgment timed out");
                        false
                    }
                }
            }
        }))
        .await;

        batch
            .iter()
            .zip(judgments)
            .find_map(|(candidate, same)| same.then_some(candidate))
    }
}

fn describe(title: &str, description: Option<&str>) -> String {
    match description {
        Some(d) if !d.trim().is_empty() => format!("{title}\n{d}"),
        _ => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{decision, FailingStore, FaultyStore, MockClassifier};
    use chrono::Duration as ChronoDuration;
    use verdict_store::{DecisionStore, MemoryStore};

    fn vocab() -> Vocabulary {
        Vocabulary::fixed(
            "test",
            &["the", "and", "over", "with", "after"],
            &["venezuela", "maduro", "argentina"],
        )
    }

    async fn seeded(decisions: Vec<Decision>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for d in decisions {
            store.insert_if_absent(d).await.unwrap();
        }
        store
    }

    fn service(store: Arc<dyn Store>) -> DeduplicationService {
        DeduplicationService::new(store, vocab(), DedupPolicy::default())
    }

    #[tokio::test]
    async fn exact_hash_is_tier_one() {
        let now = Utc::now();
        let existing = decision("Maduro freezes fuel prices", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing.clone()]).await;

        let check = service(store)
            .check_duplicate("  MADURO freezes fuel prices ", "https://a.example/1", None)
            .await;

        assert!(check.is_duplicate);
        assert_eq!(check.tier, Some(DedupTier::ExactHash));
        assert_eq!(check.matched.unwrap().id, existing.id);
    }

    #[tokio::test]
    async fn same_url_different_title_is_textual() {
        let now = Utc::now();
        let existing = decision("Argentina lifts currency controls", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing]).await;

        let check = service(store)
            .check_duplicate("Currency controls end", "HTTPS://A.EXAMPLE/1", None)
            .await;

        assert_eq!(check.tier, Some(DedupTier::Textual));
    }

    #[tokio::test]
    async fn shared_topic_and_half_overlap_is_duplicate() {
        let now = Utc::now();
        // keywords: venezuela, raises, minimum, wage  vs  venezuela, raises, minimum, salary
        // jaccard = 3/5 = 0.6 > 0.5, both topics "venezuela"
        let existing = decision("Venezuela raises minimum wage", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing]).await;

        let check = service(store)
            .check_duplicate("Venezuela raises minimum salary", "https://b.example/2", None)
            .await;

        assert_eq!(check.tier, Some(DedupTier::Textual));
    }

    #[tokio::test]
    async fn moderate_overlap_without_topic_is_unique() {
        let now = Utc::now();
        // jaccard = 3/6, no gazetteer topic on either side and the keyword
        // fallbacks differ ("central" vs "banks").
        let existing = decision("Central banks raise interest rates", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing]).await;

        let check = service(store)
            .check_duplicate("Banks raise interest fees", "https://b.example/2", None)
            .await;

        assert!(!check.is_duplicate);
    }

    #[tokio::test]
    async fn strong_overlap_is_duplicate_without_shared_topic() {
        let now = Utc::now();
        // keywords: congress, approves, pension, reform, package  vs  lawmakers + the same five
        // jaccard = 5/6 > 0.7, topics "congress" vs "lawmakers"
        let existing = decision("Congress approves pension reform package", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing.clone()]).await;

        let check = service(store)
            .check_duplicate(
                "Lawmakers: congress approves pension reform package",
                "https://b.example/2",
                None,
            )
            .await;

        assert_eq!(check.tier, Some(DedupTier::Textual));
        assert_eq!(check.matched.unwrap().id, existing.id);
    }

    #[tokio::test]
    async fn hash_lookup_failure_falls_back_to_text_scan() {
        let now = Utc::now();
        let existing = decision("Maduro freezes fuel prices", "https://a.example/1", now, &[]);
        let store = Arc::new(FaultyStore::new().failing_hash_lookup());
        store.inner().insert_if_absent(existing.clone()).await.unwrap();

        let check = service(store)
            .check_duplicate("Maduro freezes fuel prices", "https://a.example/1", None)
            .await;

        assert!(check.is_duplicate);
        assert_eq!(check.tier, Some(DedupTier::Textual));
        assert_eq!(check.matched.unwrap().id, existing.id);
    }

    #[tokio::test]
    async fn candidates_outside_window_are_ignored() {
        let now = Utc::now();
        let old = decision(
            "Venezuela raises minimum wage",
            "https://a.example/1",
            now - ChronoDuration::days(8),
            &[],
        );
        let store = seeded(vec![old]).await;

        let check = service(store)
            .check_duplicate("Venezuela raises minimum salary", "https://b.example/2", None)
            .await;

        assert!(!check.is_duplicate);
    }

    #[tokio::test]
    async fn semantic_tier_needs_description() {
        let now = Utc::now();
        let existing = decision("Caracas announces fuel rationing", "https://a.example/1", now, &[]);
        let store = seeded(vec![existing]).await;
        let classifier = Arc::new(MockClassifier::new().on_duplicate("Caracas"));
        let dedup = service(store).with_classifier(classifier.clone());

        let without = dedup
            .check_duplicate("Gasoline limits imposed nationwide", "https://b.example/2", None)
            .await;
        assert!(!without.is_duplicate);
        assert!(classifier.judged().is_empty());

        let with = dedup
            .check_duplicate(
                "Gasoline limits imposed nationwide",
                "https://b.example/2",
                Some("Drivers limited to 20 litres a week"),
            )
            .await;
        assert_eq!(with.tier, Some(DedupTier::Semantic));
    }

    #[tokio::test]
    async fn semantic_prefers_most_recent_confirmed_candidate() {
        let now = Utc::now();
        let older = decision("Ports close after storm", "https://a.example/1", now - ChronoDuration::hours(5), &[]);
        let newer = decision("Harbours shut during storm", "https://a.example/2", now - ChronoDuration::hours(1), &[]);
        let store = seeded(vec![older, newer.clone()]).await;
        let classifier = Arc::new(MockClassifier::new().on_duplicate("storm"));

        let check = service(store)
            .with_classifier(classifier)
            .check_duplicate("Shipping halted", "https://b.example/9", Some("Gale warnings"))
            .await;

        assert_eq!(check.matched.unwrap().id, newer.id);
    }

    #[tokio::test(start_paused = true)]
    async fn semantic_timeout_and_error_are_not_duplicates() {
        let now = Utc::now();
        let hanging = decision("Slow oracle story", "https://a.example/1", now - ChronoDuration::hours(1), &[]);
        let broken = decision("Broken oracle story", "https://a.example/2", now - ChronoDuration::hours(2), &[]);
        let confirmed = decision("Confirmed oracle story", "https://a.example/3", now - ChronoDuration::hours(3), &[]);
        let store = seeded(vec![hanging, broken, confirmed.clone()]).await;
        let classifier = Arc::new(
            MockClassifier::new()
                .hanging_on("Slow")
                .failing_on("Broken")
                .on_duplicate("Confirmed"),
        );

        let check = service(store)
            .with_classifier(classifier.clone())
            .check_duplicate_at("Unrelated headline", "https://b.example/9", Some("details"), now)
            .await;

        assert_eq!(check.tier, Some(DedupTier::Semantic));
        assert_eq!(check.matched.unwrap().id, confirmed.id);
        assert_eq!(classifier.judged().len(), 3);
    }

    #[tokio::test]
    async fn semantic_candidates_are_capped() {
        let now = Utc::now();
        let decisions = (0..15)
            .map(|i| {
                decision(
                    &format!("Unrelated story number {i}"),
                    &format!("https://a.example/{i}"),
                    now - ChronoDuration::minutes(i),
                    &[],
                )
            })
            .collect();
        let store = seeded(decisions).await;
        let classifier = Arc::new(MockClassifier::new());

        service(store)
            .with_classifier(classifier.clone())
            .check_duplicate("Quiet headline", "https://b.example/9", Some("details"))
            .await;

        assert_eq!(classifier.judged().len(), 10);
    }

    #[tokio::test]
    async fn storage_failure_degrades_to_unique() {
        let check = service(Arc::new(FailingStore))
            .check_duplicate("Anything at all", "https://a.example/1", Some("details"))
            .await;
        assert_eq!(check, DuplicateCheck::unique());
    }

    #[tokio::test]
    async fn second_call_after_insert_is_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let dedup = service(store.clone());
        let first = dedup
            .check_duplicate("Argentina dollarizes economy", "https://a.example/1", None)
            .await;
        assert!(!first.is_duplicate);

        store
            .insert_if_absent(decision(
                "Argentina dollarizes economy",
                "https://a.example/1",
                Utc::now(),
                &[],
            ))
            .await
            .unwrap();

        let second = dedup
            .check_duplicate("Argentina dollarizes economy", "https://a.example/1", None)
            .await;
        assert!(second.is_duplicate);
    }
}
