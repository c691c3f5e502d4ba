// Test mocks for the engine.
//
// One mock per collaborator boundary:
// - MockClassifier (Classifier): substring rules for duplicates and sentiment
// - MockFeed (ContentFeed): fixed records or a fixed failure
// - FixedIndicatorSource (IndicatorSource): (indicator, as_of) → value
// - FailingStore (Store): every call returns Unavailable
// - FaultyStore (Store): MemoryStore with chosen reads failing
//
// Plus fixture helpers for records, decisions and data points.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use verdict_common::{
    ContentRecord, Decision, DecisionDraft, DecisionPatch, Indicator, IndicatorDataPoint,
    MeasureType, Resolution, Sentiment,
};
use verdict_store::{
    DecisionStore, IndicatorStore, InsertOutcome, MemoryStore, ResolutionStore, StoreError,
};

use crate::traits::{Classifier, ContentFeed, IndicatorSource};

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

enum Reply {
    Yes,
    Fail,
    Hang,
}

/// Rules match when the *existing* side of a duplicate judgment, or the title
/// of a sentiment call, contains the registered needle. Unmatched duplicate
/// judgments answer "no"; unmatched sentiment calls answer neutral.
/// Builder pattern: `.on_duplicate()`, `.failing_on()`, `.hanging_on()`,
/// `.on_sentiment()`, `.sentiment_failing_on()`.
pub struct MockClassifier {
    duplicate_rules: Vec<(String, Reply)>,
    sentiments: Vec<(String, Sentiment)>,
    sentiment_failures: Vec<String>,
    judged: Mutex<Vec<String>>,
    classified: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            duplicate_rules: Vec::new(),
            sentiments: Vec::new(),
            sentiment_failures: Vec::new(),
            judged: Mutex::new(Vec::new()),
            classified: Mutex::new(Vec::new()),
        }
    }

    pub fn on_duplicate(mut self, existing_contains: &str) -> Self {
        self.duplicate_rules
            .push((existing_contains.to_string(), Reply::Yes));
        self
    }

    pub fn failing_on(mut self, existing_contains: &str) -> Self {
        self.duplicate_rules
            .push((existing_contains.to_string(), Reply::Fail));
        self
    }

    /// Never answers; the caller's timeout has to fire.
    pub fn hanging_on(mut self, existing_contains: &str) -> Self {
        self.duplicate_rules
            .push((existing_contains.to_string(), Reply::Hang));
        self
    }

    pub fn on_sentiment(mut self, title_contains: &str, sentiment: Sentiment) -> Self {
        self.sentiments.push((title_contains.to_string(), sentiment));
        self
    }

    pub fn sentiment_failing_on(mut self, title_contains: &str) -> Self {
        self.sentiment_failures.push(title_contains.to_string());
        self
    }

    /// Existing-side texts passed to `judge_duplicate`, in call order.
    pub fn judged(&self) -> Vec<String> {
        self.judged.lock().unwrap().clone()
    }

    /// Titles passed to `classify_sentiment`, in call order.
    pub fn classified(&self) -> Vec<String> {
        self.classified.lock().unwrap().clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn judge_duplicate(&self, _candidate: &str, existing: &str) -> Result<bool> {
        self.judged.lock().unwrap().push(existing.to_string());

        let rule = self
            .duplicate_rules
            .iter()
            .find(|(needle, _)| existing.contains(needle.as_str()));
        match rule.map(|(_, reply)| reply) {
            Some(Reply::Yes) => Ok(true),
            Some(Reply::Fail) => bail!("MockClassifier: scripted failure for {existing}"),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn classify_sentiment(&self, title: &str, _summary: Option<&str>) -> Result<Sentiment> {
        self.classified.lock().unwrap().push(title.to_string());

        if self
            .sentiment_failures
            .iter()
            .any(|needle| title.contains(needle.as_str()))
        {
            bail!("MockClassifier: scripted sentiment failure for {title}");
        }
        Ok(self
            .sentiments
            .iter()
            .find(|(needle, _)| title.contains(needle.as_str()))
            .map(|(_, s)| *s)
            .unwrap_or(Sentiment::Neutral))
    }
}

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

pub struct MockFeed {
    name: String,
    records: Option<Vec<ContentRecord>>,
}

impl MockFeed {
    pub fn new(name: &str, records: Vec<ContentRecord>) -> Self {
        Self {
            name: name.to_string(),
            records: Some(records),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: None,
        }
    }
}

#[async_trait]
impl ContentFeed for MockFeed {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ContentRecord>> {
        match &self.records {
            Some(records) => Ok(records.clone()),
            None => bail!("MockFeed: {} is down", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// FixedIndicatorSource
// ---------------------------------------------------------------------------

/// Exact `(indicator id, as_of)` lookup. Unknown keys have no observation.
pub struct FixedIndicatorSource {
    values: HashMap<(String, DateTime<Utc>), f64>,
    failing: Vec<String>,
}

impl FixedIndicatorSource {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            failing: Vec::new(),
        }
    }

    pub fn on(mut self, indicator_id: &str, as_of: DateTime<Utc>, value: f64) -> Self {
        self.values.insert((indicator_id.to_string(), as_of), value);
        self
    }

    pub fn failing(mut self, indicator_id: &str) -> Self {
        self.failing.push(indicator_id.to_string());
        self
    }
}

impl Default for FixedIndicatorSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndicatorSource for FixedIndicatorSource {
    async fn value(&self, indicator: &Indicator, as_of: DateTime<Utc>) -> Result<Option<f64>> {
        if self.failing.contains(&indicator.id) {
            bail!("FixedIndicatorSource: {} unavailable", indicator.id);
        }
        Ok(self.values.get(&(indicator.id.clone(), as_of)).copied())
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// Store whose every call fails, for exercising degrade paths.
pub struct FailingStore;

fn down<T>() -> verdict_store::Result<T> {
    Err(StoreError::Unavailable("FailingStore".to_string()))
}

#[async_trait]
impl DecisionStore for FailingStore {
    async fn get(&self, _id: Uuid) -> verdict_store::Result<Option<Decision>> {
        down()
    }

    async fn get_by_hash(&self, _hash: &str) -> verdict_store::Result<Option<Decision>> {
        down()
    }

    async fn recent_since(&self, _since: DateTime<Utc>) -> verdict_store::Result<Vec<Decision>> {
        down()
    }

    async fn insert_if_absent(&self, _decision: Decision) -> verdict_store::Result<InsertOutcome> {
        down()
    }

    async fn patch(&self, _id: Uuid, _patch: &DecisionPatch) -> verdict_store::Result<Decision> {
        down()
    }

    async fn list_unresolved(&self) -> verdict_store::Result<Vec<Decision>> {
        down()
    }
}

#[async_trait]
impl IndicatorStore for FailingStore {
    async fn get_indicator(&self, _id: &str) -> verdict_store::Result<Option<Indicator>> {
        down()
    }

    async fn upsert_indicator(&self, _indicator: &Indicator) -> verdict_store::Result<()> {
        down()
    }

    async fn data_points(&self, _decision_id: Uuid) -> verdict_store::Result<Vec<IndicatorDataPoint>> {
        down()
    }

    async fn upsert_data_point(&self, _point: &IndicatorDataPoint) -> verdict_store::Result<()> {
        down()
    }
}

#[async_trait]
impl ResolutionStore for FailingStore {
    async fn get_by_decision(&self, _decision_id: Uuid) -> verdict_store::Result<Option<Resolution>> {
        down()
    }

    async fn upsert(&self, _resolution: &Resolution) -> verdict_store::Result<Resolution> {
        down()
    }

    async fn count_for_decision(&self, _decision_id: Uuid) -> verdict_store::Result<usize> {
        down()
    }
}

// ---------------------------------------------------------------------------
// FaultyStore
// ---------------------------------------------------------------------------

/// In-memory store with individual reads switched to fail.
/// Builder pattern: `.failing_hash_lookup()`, `.failing_data_points()`.
pub struct FaultyStore {
    inner: MemoryStore,
    fail_hash_lookup: bool,
    fail_data_points: Vec<Uuid>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_hash_lookup: false,
            fail_data_points: Vec::new(),
        }
    }

    pub fn failing_hash_lookup(mut self) -> Self {
        self.fail_hash_lookup = true;
        self
    }

    pub fn failing_data_points(mut self, decision_id: Uuid) -> Self {
        self.fail_data_points.push(decision_id);
        self
    }

    /// The healthy store underneath, for seeding.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

impl Default for FaultyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionStore for FaultyStore {
    async fn get(&self, id: Uuid) -> verdict_store::Result<Option<Decision>> {
        self.inner.get(id).await
    }

    async fn get_by_hash(&self, hash: &str) -> verdict_store::Result<Option<Decision>> {
        if self.fail_hash_lookup {
            return down();
        }
        self.inner.get_by_hash(hash).await
    }

    async fn recent_since(&self, since: DateTime<Utc>) -> verdict_store::Result<Vec<Decision>> {
        self.inner.recent_since(since).await
    }

    async fn insert_if_absent(&self, decision: Decision) -> verdict_store::Result<InsertOutcome> {
        self.inner.insert_if_absent(decision).await
    }

    async fn patch(&self, id: Uuid, patch: &DecisionPatch) -> verdict_store::Result<Decision> {
        self.inner.patch(id, patch).await
    }

    async fn list_unresolved(&self) -> verdict_store::Result<Vec<Decision>> {
        self.inner.list_unresolved().await
    }
}

#[async_trait]
impl IndicatorStore for FaultyStore {
    async fn get_indicator(&self, id: &str) -> verdict_store::Result<Option<Indicator>> {
        self.inner.get_indicator(id).await
    }

    async fn upsert_indicator(&self, indicator: &Indicator) -> verdict_store::Result<()> {
        self.inner.upsert_indicator(indicator).await
    }

    async fn data_points(&self, decision_id: Uuid) -> verdict_store::Result<Vec<IndicatorDataPoint>> {
        if self.fail_data_points.contains(&decision_id) {
            return down();
        }
        self.inner.data_points(decision_id).await
    }

    async fn upsert_data_point(&self, point: &IndicatorDataPoint) -> verdict_store::Result<()> {
        self.inner.upsert_data_point(point).await
    }
}

#[async_trait]
impl ResolutionStore for FaultyStore {
    async fn get_by_decision(&self, decision_id: Uuid) -> verdict_store::Result<Option<Resolution>> {
        self.inner.get_by_decision(decision_id).await
    }

    async fn upsert(&self, resolution: &Resolution) -> verdict_store::Result<Resolution> {
        self.inner.upsert(resolution).await
    }

    async fn count_for_decision(&self, decision_id: Uuid) -> verdict_store::Result<usize> {
        self.inner.count_for_decision(decision_id).await
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn record(title: &str, url: &str, published_at: DateTime<Utc>) -> ContentRecord {
    ContentRecord {
        title: title.to_string(),
        url: url.to_string(),
        published_at,
        source: "fixture".to_string(),
        summary: None,
    }
}

/// An announced Decision dated and created at `at`.
pub fn decision(title: &str, url: &str, at: DateTime<Utc>, indicator_ids: &[&str]) -> Decision {
    let draft = DecisionDraft::builder()
        .title(title)
        .source_url(url)
        .date(at)
        .indicator_ids(indicator_ids.iter().map(|s| s.to_string()).collect())
        .build();
    Decision::from_draft(draft, None, at)
}

pub fn indicator(id: &str) -> Indicator {
    Indicator {
        id: id.to_string(),
        name: id.to_uppercase(),
        source_kind: "fixture".to_string(),
    }
}

pub fn data_point(
    decision_id: Uuid,
    indicator_id: &str,
    measure_type: MeasureType,
    value: f64,
) -> IndicatorDataPoint {
    IndicatorDataPoint {
        decision_id,
        indicator_id: indicator_id.to_string(),
        measure_type,
        value,
        date: Utc::now(),
    }
}
