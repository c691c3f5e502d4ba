//! Greedy single-pass grouping of Content Records into Event Clusters.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use verdict_common::policy::MIN_SHARED_KEYWORDS;
use verdict_common::text::{extract_keywords, main_topic};
use verdict_common::{ContentRecord, Vocabulary};

/// Reports believed to describe the same real-world event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCluster {
    pub members: Vec<ContentRecord>,
    /// Union of member title keywords.
    pub keywords: BTreeSet<String>,
    pub main_topic: Option<String>,
}

impl EventCluster {
    fn seed(record: ContentRecord, keywords: Vec<String>, topic: Option<String>) -> Self {
        Self {
            members: vec![record],
            keywords: keywords.into_iter().collect(),
            main_topic: topic,
        }
    }

    fn shared_keywords(&self, keywords: &[String]) -> usize {
        keywords.iter().filter(|k| self.keywords.contains(*k)).count()
    }

    fn absorb(&mut self, record: ContentRecord, keywords: Vec<String>, topic: Option<String>) {
        self.members.push(record);
        self.keywords.extend(keywords);
        // Shortest topic wins; ties keep the one already chosen.
        if let Some(topic) = topic {
            let shorter = self
                .main_topic
                .as_ref()
                .map_or(true, |current| topic.chars().count() < current.chars().count());
            if shorter {
                self.main_topic = Some(topic);
            }
        }
    }

    /// Number of reports. This is the cluster's popularity.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The most recently published member. Members arrive in
    /// `(published_at, url)` order, so this is the last one.
    pub fn representative(&self) -> Option<&ContentRecord> {
        self.members.iter().max_by_key(|m| m.published_at)
    }

    pub fn latest_published_at(&self) -> Option<DateTime<Utc>> {
        self.representative().map(|m| m.published_at)
    }
}

/// Cluster with the default overlap threshold.
pub fn cluster(records: Vec<ContentRecord>, vocab: &Vocabulary) -> Vec<EventCluster> {
    cluster_with_threshold(records, vocab, MIN_SHARED_KEYWORDS)
}

/// Records are ordered by `(published_at, url)` first, so the output does not
/// depend on feed arrival order. A record joins the first cluster whose
/// accumulated keywords share at least `min_shared` tokens with its own;
/// otherwise it starts a new cluster. A record with no keywords never matches
/// and stays a singleton.
pub fn cluster_with_threshold(
    mut records: Vec<ContentRecord>,
    vocab: &Vocabulary,
    min_shared: usize,
) -> Vec<EventCluster> {
    records.sort_by(|a, b| {
        a.published_at
            .cmp(&b.published_at)
            .then_with(|| a.url.cmp(&b.url))
    });

    let mut clusters: Vec<EventCluster> = Vec::new();
    for record in records {
        let keywords = extract_keywords(&record.title, vocab);
        let topic = main_topic(&record.title, vocab);

        let target = if keywords.is_empty() {
            None
        } else {
            clusters
                .iter_mut()
                .find(|c| c.shared_keywords(&keywords) >= min_shared.max(1))
        };

        match target {
            Some(existing) => existing.absorb(record, keywords, topic),
            None => clusters.push(EventCluster::seed(record, keywords, topic)),
        }
    }
    clusters
}
