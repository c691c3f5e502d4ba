//! Scheduler entry points. Each run returns a per-item report; the
//! binary prints its summary.

pub mod detection;
pub mod refresh;
pub mod stats;
pub mod sweep;

pub use detection::{DetectionSettings, Detector};
pub use refresh::IndicatorRefresher;
pub use stats::{
    DetectionItem, DetectionOutcome, DetectionReport, RefreshItem, RefreshOutcome, RefreshReport,
    SweepItem, SweepOutcome, SweepReport,
};
pub use sweep::ResolutionSweeper;
