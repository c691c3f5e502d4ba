pub mod classifier;
pub mod cluster;
pub mod dedup;
pub mod feeds;
pub mod indicator_source;
pub mod indicators;
pub mod pipeline;
pub mod ranking;
pub mod resolution;
pub mod synthesis;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;

pub use classifier::ClaudeClassifier;
pub use cluster::{cluster, EventCluster};
pub use dedup::{DedupTier, DeduplicationService, DuplicateCheck};
pub use feeds::RssFeed;
pub use indicator_source::HttpIndicatorSource;
pub use indicators::IndicatorService;
pub use pipeline::{DetectionSettings, Detector, IndicatorRefresher, ResolutionSweeper};
pub use ranking::ScoredCluster;
pub use resolution::ResolutionEngine;
pub use synthesis::RepresentativeSynthesizer;
pub use traits::{Classifier, ContentFeed, EventSynthesizer, IndicatorSource};
