//! Event selection: score clusters, optionally filter by sentiment.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use verdict_common::{RankingPolicy, Result, Sentiment};
use verdict_store::Store;

use crate::cluster::EventCluster;
use crate::traits::Classifier;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCluster {
    pub cluster: EventCluster,
    pub score: f64,
    pub popularity: usize,
    pub diversity_penalty: f64,
    pub recency_bonus: f64,
}

/// `score = popularity × diversity_penalty × (1 + recency_bonus × weight)`,
/// sorted descending. The sort is stable, so equal scores keep input order.
pub fn rank(
    clusters: Vec<EventCluster>,
    recent_topics: &[String],
    now: DateTime<Utc>,
    policy: &RankingPolicy,
) -> Vec<ScoredCluster> {
    let recent: HashSet<String> = recent_topics.iter().map(|t| t.to_lowercase()).collect();

    let mut scored: Vec<ScoredCluster> = clusters
        .into_iter()
        .map(|cluster| {
            let popularity = cluster.len();
            let diversity_penalty = match &cluster.main_topic {
                Some(topic) if recent.contains(&topic.to_lowercase()) => policy.diversity_penalty,
                _ => 1.0,
            };
            let recency_bonus = recency_bonus(&cluster, now, policy.recency_window_days);
            let score = popularity as f64
                * diversity_penalty
                * (1.0 + recency_bonus * policy.recency_weight);
            ScoredCluster {
                cluster,
                score,
                popularity,
                diversity_penalty,
                recency_bonus,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored
}

/// Linear ramp from 0 at `now − window` to 1 at `now`, clamped.
fn recency_bonus(cluster: &EventCluster, now: DateTime<Utc>, window_days: i64) -> f64 {
    let Some(latest) = cluster.latest_published_at() else {
        return 0.0;
    };
    let window = chrono::Duration::days(window_days);
    let window_ms = window.num_milliseconds();
    if window_ms <= 0 {
        return 0.0;
    }
    let elapsed = (latest - (now - window)).num_milliseconds();
    (elapsed as f64 / window_ms as f64).clamp(0.0, 1.0)
}

/// One sentiment classification per cluster representative, bounded by a
/// timeout. A failed or timed-out call counts as "does not match".
pub struct SentimentFilter<'a> {
    target: Sentiment,
    classifier: &'a dyn Classifier,
    timeout: Duration,
}

impl<'a> SentimentFilter<'a> {
    pub fn new(target: Sentiment, classifier: &'a dyn Classifier, timeout: Duration) -> Self {
        Self {
            target,
            classifier,
            timeout,
        }
    }

    pub async fn matches(&self, scored: &ScoredCluster) -> bool {
        let Some(rep) = scored.cluster.representative() else {
            return false;
        };
        match tokio::time::timeout(
            self.timeout,
            self.classifier
                .classify_sentiment(&rep.title, rep.summary.as_deref()),
        )
        .await
        {
            Ok(Ok(sentiment)) => sentiment == self.target,
            Ok(Err(e)) => {
                warn!(title = rep.title.as_str(), error = %e, "Sentiment classification failed");
                false
            }
            Err(_) => {
                warn!(
                    title = rep.title.as_str(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Sentiment classification timed out"
                );
                false
            }
        }
    }
}

/// Keep clusters whose representative matches `target`, capped at `quota`.
///
/// Representatives are classified one at a time in rank order, and
/// classification stops once `quota` matches are found. When fewer than half
/// the quota (rounded up) match, the unfiltered ranking is returned instead,
/// capped at `quota`.
pub async fn filter_by_sentiment(
    mut ranked: Vec<ScoredCluster>,
    target: Sentiment,
    quota: usize,
    classifier: &dyn Classifier,
    timeout: Duration,
) -> Vec<ScoredCluster> {
    let filter = SentimentFilter::new(target, classifier, timeout);
    let mut matches = Vec::new();
    for scored in &ranked {
        if matches.len() >= quota {
            break;
        }
        if filter.matches(scored).await {
            matches.push(scored.clone());
        }
    }

    let needed = quota.div_ceil(2);
    if matches.len() < needed {
        info!(
            matched = matches.len(),
            needed,
            "Too few clusters match target sentiment, using unfiltered ranking"
        );
        ranked.truncate(quota);
        return ranked;
    }

    debug!(matched = matches.len(), quota, "Sentiment filter applied");
    matches
}

/// Main topics of Decisions created within the recent-topic window.
pub async fn recent_topics(
    store: &dyn Store,
    now: DateTime<Utc>,
    policy: &RankingPolicy,
) -> Result<Vec<String>> {
    let since = now - chrono::Duration::hours(policy.recent_topic_hours);
    let recent = store.recent_since(since).await?;
    Ok(recent.into_iter().filter_map(|d| d.main_topic).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::cluster;
    use crate::testing::{decision, record, MockClassifier};
    use chrono::Duration as ChronoDuration;
    use verdict_common::Vocabulary;
    use verdict_store::{DecisionStore, MemoryStore};

    fn vocab() -> Vocabulary {
        Vocabulary::fixed("test", &["the", "and"], &["venezuela", "chile"])
    }

    fn clusters(now: DateTime<Utc>) -> Vec<EventCluster> {
        cluster(
            vec![
                record("Venezuela closes border crossings", "https://a/1", now),
                record("Chile approves mining royalty", "https://b/1", now),
            ],
            &vocab(),
        )
    }

    #[test]
    fn recent_topic_gets_diversity_penalty() {
        let now = Utc::now();
        let ranked = rank(
            clusters(now),
            &["VENEZUELA".to_string()],
            now,
            &RankingPolicy::default(),
        );

        let venezuela = ranked
            .iter()
            .find(|s| s.cluster.main_topic.as_deref() == Some("venezuela"))
            .unwrap();
        let chile = ranked
            .iter()
            .find(|s| s.cluster.main_topic.as_deref() == Some("chile"))
            .unwrap();

        assert_eq!(venezuela.diversity_penalty, 0.3);
        assert_eq!(chile.diversity_penalty, 1.0);
        assert!((venezuela.score - 0.3 * 1.2).abs() < 1e-9);
        assert!((chile.score - 1.2).abs() < 1e-9);
        assert_eq!(ranked[0].cluster.main_topic.as_deref(), Some("chile"));
    }

    #[test]
    fn recency_bonus_ramps_and_clamps() {
        let now = Utc::now();
        let policy = RankingPolicy::default();
        let fresh = cluster(vec![record("Fresh story today", "https://a/1", now)], &vocab());
        let half = cluster(
            vec![record("Midweek story here", "https://a/2", now - ChronoDuration::hours(84))],
            &vocab(),
        );
        let stale = cluster(
            vec![record("Stale story archive", "https://a/3", now - ChronoDuration::days(30))],
            &vocab(),
        );

        assert!((recency_bonus(&fresh[0], now, policy.recency_window_days) - 1.0).abs() < 1e-9);
        assert!((recency_bonus(&half[0], now, policy.recency_window_days) - 0.5).abs() < 1e-9);
        assert_eq!(recency_bonus(&stale[0], now, policy.recency_window_days), 0.0);
    }

    #[test]
    fn popularity_dominates_and_ties_keep_order() {
        let now = Utc::now();
        let input = cluster(
            vec![
                record("Peru mining strike spreads", "https://a/1", now),
                record("Bolivia lithium contract signed", "https://b/1", now),
                record("Bolivia lithium contract criticized", "https://b/2", now),
                record("Ecuador oil auction delayed", "https://c/1", now),
            ],
            &vocab(),
        );
        let ranked = rank(input, &[], now, &RankingPolicy::default());

        let first_titles: Vec<&str> = ranked
            .iter()
            .map(|s| s.cluster.members[0].title.as_str())
            .collect();
        assert_eq!(ranked[0].popularity, 2);
        assert_eq!(
            first_titles[1..],
            ["Peru mining strike spreads", "Ecuador oil auction delayed"]
        );
    }

    fn scored(titles: &[&str]) -> Vec<ScoredCluster> {
        let now = Utc::now();
        titles
            .iter()
            .enumerate()
            .flat_map(|(i, title)| {
                cluster(vec![record(title, &format!("https://x/{i}"), now)], &vocab())
            })
            .map(|cluster| ScoredCluster {
                cluster,
                score: 1.0,
                popularity: 1,
                diversity_penalty: 1.0,
                recency_bonus: 0.0,
            })
            .collect()
    }

    #[tokio::test]
    async fn sentiment_filter_keeps_matches_up_to_quota() {
        let ranked = scored(&["Good news one", "Bad news two", "Good news three", "Good news four"]);
        let classifier = MockClassifier::new().on_sentiment("Good", Sentiment::Positive);

        let kept = filter_by_sentiment(
            ranked,
            Sentiment::Positive,
            2,
            &classifier,
            Duration::from_secs(1),
        )
        .await;

        let titles: Vec<&str> = kept
            .iter()
            .map(|s| s.cluster.members[0].title.as_str())
            .collect();
        assert_eq!(titles, ["Good news one", "Good news three"]);
    }

    #[tokio::test]
    async fn sentiment_filter_falls_back_when_too_few_match() {
        let ranked = scored(&["Bad news one", "Good news two", "Bad news three", "Bad news four"]);
        let classifier = MockClassifier::new()
            .on_sentiment("Good", Sentiment::Positive)
            .on_sentiment("Bad", Sentiment::Negative);

        // quota 4 needs 2 matches; only one positive
        let kept = filter_by_sentiment(
            ranked,
            Sentiment::Positive,
            4,
            &classifier,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(kept.len(), 4);
        assert_eq!(kept[0].cluster.members[0].title, "Bad news one");
    }

    #[tokio::test]
    async fn sentiment_errors_drop_the_cluster() {
        let ranked = scored(&["Good news one", "Good news broken", "Good news three"]);
        let classifier = MockClassifier::new()
            .on_sentiment("Good", Sentiment::Positive)
            .sentiment_failing_on("broken");

        let kept = filter_by_sentiment(
            ranked,
            Sentiment::Positive,
            3,
            &classifier,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|s| !s.cluster.members[0].title.contains("broken")));
    }

    #[tokio::test]
    async fn sentiment_classification_stops_at_quota() {
        let titles: Vec<String> = (0..200).map(|i| format!("Good story {i}")).collect();
        let refs: Vec<&str> = titles.iter().map(String::as_str).collect();
        let classifier = MockClassifier::new().on_sentiment("Good", Sentiment::Positive);

        let kept = filter_by_sentiment(
            scored(&refs),
            Sentiment::Positive,
            5,
            &classifier,
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(kept.len(), 5);
        assert_eq!(classifier.classified().len(), 5);
        assert_eq!(kept[0].cluster.members[0].title, "Good story 0");
    }

    #[tokio::test]
    async fn recent_topics_reads_last_day_only() {
        let now = Utc::now();
        let store = MemoryStore::new();
        let mut today = decision("Venezuela story", "https://a/1", now - ChronoDuration::hours(2), &[]);
        today.main_topic = Some("venezuela".to_string());
        let mut older = decision("Chile story", "https://a/2", now - ChronoDuration::hours(30), &[]);
        older.main_topic = Some("chile".to_string());
        store.insert_if_absent(today).await.unwrap();
        store.insert_if_absent(older).await.unwrap();

        let topics = recent_topics(&store, now, &RankingPolicy::default())
            .await
            .unwrap();
        assert_eq!(topics, vec!["venezuela".to_string()]);
    }
}
