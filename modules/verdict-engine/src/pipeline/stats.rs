use uuid::Uuid;

use verdict_common::{Issue, MeasureType};

use crate::dedup::DedupTier;

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Created { decision_id: Uuid },
    Duplicate { matched: Uuid, tier: DedupTier },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionItem {
    pub title: String,
    pub source_url: String,
    pub outcome: DetectionOutcome,
}

/// Result of one detection run, item by item.
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub feeds_fetched: u32,
    /// (feed name, reason)
    pub feeds_failed: Vec<(String, String)>,
    pub records: u32,
    pub clusters: u32,
    pub selected: u32,
    pub items: Vec<DetectionItem>,
}

impl DetectionReport {
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, DetectionOutcome::Created { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, DetectionOutcome::Duplicate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DetectionOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&DetectionOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

impl std::fmt::Display for DetectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Detection Run Complete ===")?;
        writeln!(f, "Feeds fetched:      {}", self.feeds_fetched)?;
        writeln!(f, "Feeds failed:       {}", self.feeds_failed.len())?;
        writeln!(f, "Records:            {}", self.records)?;
        writeln!(f, "Clusters:           {}", self.clusters)?;
        writeln!(f, "Selected:           {}", self.selected)?;
        writeln!(f, "Decisions created:  {}", self.created())?;
        writeln!(f, "Duplicates:         {}", self.duplicates())?;
        writeln!(f, "Failed:             {}", self.failed())?;
        if !self.feeds_failed.is_empty() {
            writeln!(f, "\nUnavailable feeds:")?;
            for (feed, reason) in &self.feeds_failed {
                writeln!(f, "  {feed}: {reason}")?;
            }
        }
        if !self.items.is_empty() {
            writeln!(f, "\nItems:")?;
            for item in &self.items {
                match &item.outcome {
                    DetectionOutcome::Created { decision_id } => {
                        writeln!(f, "  + {} ({decision_id})", item.title)?
                    }
                    DetectionOutcome::Duplicate { matched, tier } => {
                        writeln!(f, "  = {} (dup of {matched}, {tier})", item.title)?
                    }
                    DetectionOutcome::Failed { reason } => {
                        writeln!(f, "  ! {} ({reason})", item.title)?
                    }
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Indicator refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Recorded { value: f64 },
    /// Source has no observation yet; retried next run.
    Pending,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshItem {
    pub decision_id: Uuid,
    pub indicator_id: String,
    pub measure_type: MeasureType,
    pub outcome: RefreshOutcome,
}

#[derive(Debug, Default)]
pub struct RefreshReport {
    pub decisions_scanned: u32,
    pub items: Vec<RefreshItem>,
}

impl RefreshReport {
    pub fn recorded(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Recorded { .. }))
    }

    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Pending))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RefreshOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RefreshOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

impl std::fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Indicator Refresh Complete ===")?;
        writeln!(f, "Decisions scanned:  {}", self.decisions_scanned)?;
        writeln!(f, "Points recorded:    {}", self.recorded())?;
        writeln!(f, "Pending:            {}", self.pending())?;
        writeln!(f, "Failed:             {}", self.failed())?;
        for item in &self.items {
            if let RefreshOutcome::Failed { reason } = &item.outcome {
                writeln!(
                    f,
                    "  ! {} {} {}: {reason}",
                    item.decision_id, item.indicator_id, item.measure_type
                )?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Resolution sweep
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Resolved { issue: Issue, confidence: f64 },
    /// Decision has no indicators attached.
    NoIndicators,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepItem {
    pub decision_id: Uuid,
    pub title: String,
    pub outcome: SweepOutcome,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub unresolved: u32,
    /// Unresolved but not yet mature.
    pub not_due: u32,
    pub items: Vec<SweepItem>,
}

impl SweepReport {
    pub fn resolved(&self) -> usize {
        self.count(|o| matches!(o, SweepOutcome::Resolved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SweepOutcome::NoIndicators))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SweepOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SweepOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Resolution Sweep Complete ===")?;
        writeln!(f, "Unresolved:         {}", self.unresolved)?;
        writeln!(f, "Not yet mature:     {}", self.not_due)?;
        writeln!(f, "Resolved:           {}", self.resolved())?;
        writeln!(f, "No indicators:      {}", self.skipped())?;
        writeln!(f, "Failed:             {}", self.failed())?;
        for item in &self.items {
            match &item.outcome {
                SweepOutcome::Resolved { issue, confidence } => {
                    writeln!(f, "  {:<8} {confidence:>5.1}  {}", issue.as_str(), item.title)?
                }
                SweepOutcome::NoIndicators => writeln!(f, "  skipped         {}", item.title)?,
                SweepOutcome::Failed { reason } => {
                    writeln!(f, "  failed          {} ({reason})", item.title)?
                }
            }
        }
        Ok(())
    }
}
