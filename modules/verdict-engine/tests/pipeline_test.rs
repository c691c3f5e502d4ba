//! Pipeline runs against the in-memory store: detection, indicator refresh
//! and the resolution sweep, chained the way the scheduler drives them.

use std::sync::Arc;

use chrono::{Duration, Utc};

use verdict_common::{DecisionStatus, Issue, MeasureType, ResolutionMethod, Sentiment};
use verdict_engine::pipeline::DetectionOutcome;
use verdict_engine::testing::{decision, indicator, record, FixedIndicatorSource, MockClassifier, MockFeed};
use verdict_engine::{
    DedupTier, DetectionSettings, Detector, IndicatorRefresher, IndicatorService,
    RepresentativeSynthesizer, ResolutionEngine, ResolutionSweeper,
};
use verdict_store::{DecisionStore, MemoryStore, ResolutionStore};

fn detector(store: Arc<MemoryStore>, settings: DetectionSettings) -> Detector {
    let synthesizer = Arc::new(RepresentativeSynthesizer::new(vec!["gdp".to_string()]));
    Detector::new(store, synthesizer, settings)
}

#[tokio::test]
async fn detection_survives_feed_failure_and_second_run_is_all_duplicates() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let wire = Arc::new(MockFeed::new(
        "wire",
        vec![
            record("Chile approves pension reform", "https://wire/1", now - Duration::hours(2)),
            record("Chile pension reform clears congress", "https://wire/2", now - Duration::hours(1)),
            record("Peru raises interest rates", "https://wire/3", now - Duration::hours(3)),
        ],
    ));

    let detector = detector(store.clone(), DetectionSettings::default())
        .with_feed(wire)
        .with_feed(Arc::new(MockFeed::failing("down")));

    let first = detector.run_detection_at(now).await;
    assert_eq!(first.feeds_fetched, 1);
    assert_eq!(first.feeds_failed.len(), 1);
    assert_eq!(first.feeds_failed[0].0, "down");
    assert_eq!(first.records, 3);
    assert_eq!(first.clusters, 2);
    assert_eq!(first.created(), 2);
    assert_eq!(store.decision_count(), 2);

    let second = detector.run_detection_at(now).await;
    assert_eq!(second.created(), 0);
    assert_eq!(second.duplicates(), 2);
    assert!(second.items.iter().all(|item| matches!(
        item.outcome,
        DetectionOutcome::Duplicate { tier: DedupTier::ExactHash, .. }
    )));
    assert_eq!(store.decision_count(), 2);
}

#[tokio::test]
async fn quota_counts_created_decisions() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut settings = DetectionSettings::default();
    settings.detection.quota = 1;

    let feed = Arc::new(MockFeed::new(
        "wire",
        vec![
            record("Chile approves pension reform", "https://wire/1", now),
            record("Peru raises interest rates", "https://wire/2", now),
        ],
    ));
    let report = detector(store.clone(), settings).with_feed(feed).run_detection_at(now).await;

    assert_eq!(report.selected, 2);
    assert_eq!(report.created(), 1);
    assert_eq!(store.decision_count(), 1);
}

#[tokio::test]
async fn recently_covered_topic_loses_the_slot() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut covered = decision(
        "Venezuela announces currency redenomination",
        "https://old/1",
        now - Duration::hours(3),
        &[],
    );
    covered.main_topic = Some("venezuela".to_string());
    store.insert_if_absent(covered).await.unwrap();

    let mut settings = DetectionSettings::default();
    settings.detection.quota = 1;
    let feed = Arc::new(MockFeed::new(
        "wire",
        vec![
            record("Venezuela closes border crossings", "https://wire/1", now),
            record("Chile approves mining royalty", "https://wire/2", now),
        ],
    ));
    let report = detector(store.clone(), settings).with_feed(feed).run_detection_at(now).await;

    assert_eq!(report.created(), 1);
    assert_eq!(report.items[0].title, "Chile approves mining royalty");
}

#[tokio::test]
async fn semantic_duplicate_is_not_created() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut existing = decision(
        "Bolivia nationalizes lithium deposits",
        "https://old/1",
        now - Duration::days(1),
        &[],
    );
    existing.summary = Some("State takes over extraction contracts".to_string());
    store.insert_if_absent(existing.clone()).await.unwrap();

    let mut incoming = record("La Paz seizes control of battery metals", "https://wire/9", now);
    incoming.summary = Some("Government assumes lithium operations".to_string());

    let classifier = Arc::new(MockClassifier::new().on_duplicate("Bolivia"));
    let report = detector(store.clone(), DetectionSettings::default())
        .with_feed(Arc::new(MockFeed::new("wire", vec![incoming])))
        .with_classifier(classifier.clone())
        .run_detection_at(now)
        .await;

    assert_eq!(report.created(), 0);
    assert_eq!(
        report.items[0].outcome,
        DetectionOutcome::Duplicate {
            matched: existing.id,
            tier: DedupTier::Semantic,
        }
    );
    assert_eq!(classifier.judged().len(), 1);
    assert_eq!(store.decision_count(), 1);
}

#[tokio::test]
async fn sentiment_gate_keeps_walking_past_duplicates() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    store
        .insert_if_absent(decision(
            "Bumper harvest lifts Paraguay exports",
            "https://wire/1",
            now - Duration::hours(1),
            &[],
        ))
        .await
        .unwrap();

    let mut settings = DetectionSettings::default();
    settings.detection.quota = 2;
    settings.detection.target_sentiment = Some(Sentiment::Positive);
    let feed = Arc::new(MockFeed::new(
        "wire",
        vec![
            record("Bumper harvest lifts Paraguay exports", "https://wire/1", now),
            record("Heavy rains refill Uruguay reservoirs", "https://wire/2", now),
            record("Tourism season boosts Panama revenue", "https://wire/3", now),
            record("Storm damages Honduras coffee crop", "https://wire/4", now),
        ],
    ));
    let classifier = Arc::new(
        MockClassifier::new()
            .on_sentiment("harvest", Sentiment::Positive)
            .on_sentiment("rains", Sentiment::Positive)
            .on_sentiment("Tourism", Sentiment::Positive)
            .on_sentiment("Storm", Sentiment::Negative),
    );

    let report = detector(store.clone(), settings)
        .with_feed(feed)
        .with_classifier(classifier)
        .run_detection_at(now)
        .await;

    assert_eq!(report.created(), 2);
    assert_eq!(store.decision_count(), 3);
    let created: Vec<&str> = report
        .items
        .iter()
        .filter(|item| matches!(item.outcome, DetectionOutcome::Created { .. }))
        .map(|item| item.title.as_str())
        .collect();
    assert!(!created.contains(&"Storm damages Honduras coffee crop"));
}

#[tokio::test]
async fn sentiment_is_classified_only_until_quota_is_met() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let mut settings = DetectionSettings::default();
    settings.detection.quota = 2;
    settings.detection.target_sentiment = Some(Sentiment::Positive);

    let records = (0..40)
        .map(|i| {
            record(
                &format!("Upbeat{i} report{i} growth{i}"),
                &format!("https://wire/{i}"),
                now,
            )
        })
        .collect();
    let classifier = Arc::new(MockClassifier::new().on_sentiment("Upbeat", Sentiment::Positive));

    let report = detector(store.clone(), settings)
        .with_feed(Arc::new(MockFeed::new("wire", records)))
        .with_classifier(classifier.clone())
        .run_detection_at(now)
        .await;

    assert_eq!(report.clusters, 40);
    assert_eq!(report.created(), 2);
    assert_eq!(classifier.classified().len(), 2);
}

#[tokio::test]
async fn decision_lifecycle_from_refresh_to_override() {
    let now = Utc::now();
    let store = Arc::new(MemoryStore::new());
    let d = decision("Peru cuts fuel subsidies", "https://wire/5", now - Duration::days(400), &["gdp"]);
    store.insert_if_absent(d.clone()).await.unwrap();
    IndicatorService::new(store.clone())
        .register(&indicator("gdp"))
        .await
        .unwrap();

    let source = [
        (MeasureType::Baseline, 100.0),
        (MeasureType::Days30, 110.0),
        (MeasureType::Days90, 120.0),
        (MeasureType::Days180, 115.0),
        (MeasureType::Days365, 105.0),
    ]
    .into_iter()
    .fold(FixedIndicatorSource::new(), |source, (window, value)| {
        source.on("gdp", window.due_at(d.date), value)
    });

    // Refresh records every window and starts tracking
    let refresh = IndicatorRefresher::new(store.clone(), Arc::new(source))
        .run_indicator_refresh_at(now)
        .await
        .unwrap();
    assert_eq!(refresh.recorded(), 5);
    assert_eq!(
        store.get(d.id).await.unwrap().unwrap().status,
        DecisionStatus::Tracking
    );

    // Sweep: +10, +20, +15, +5 percent weigh in at 27
    let engine = ResolutionEngine::new(store.clone(), Default::default());
    let sweep = ResolutionSweeper::new(store.clone(), engine)
        .run_resolution_sweep_at(now)
        .await
        .unwrap();
    assert_eq!(sweep.resolved(), 1);

    let resolution = store.get_by_decision(d.id).await.unwrap().unwrap();
    assert_eq!(resolution.issue, Issue::Partial);
    assert_eq!(resolution.confidence, 30.0);
    assert!((resolution.details.weighted_score - 27.0).abs() < 1e-9);
    assert_eq!(resolution.variations.len(), 4);
    assert_eq!(
        store.get(d.id).await.unwrap().unwrap().status,
        DecisionStatus::Resolved
    );

    // Resolved decisions drop out of later sweeps
    let engine = ResolutionEngine::new(store.clone(), Default::default());
    let again = ResolutionSweeper::new(store.clone(), engine)
        .run_resolution_sweep_at(now)
        .await
        .unwrap();
    assert_eq!(again.unresolved, 0);

    // Override keeps one row per Decision
    let manual = ResolutionEngine::new(store.clone(), Default::default())
        .resolve_manual(d.id, Issue::Works, 140.0, Some("audited figures".to_string()))
        .await
        .unwrap();
    assert_eq!(manual.id, resolution.id);
    assert_eq!(manual.method, ResolutionMethod::Manual);
    assert_eq!(manual.confidence, 100.0);
    assert_eq!(store.count_for_decision(d.id).await.unwrap(), 1);
}
