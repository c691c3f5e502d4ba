use anyhow::{anyhow, Result};
use async_trait::async_trait;

use verdict_common::{DecisionDraft, IndicatorId};

use crate::cluster::EventCluster;
use crate::traits::EventSynthesizer;

/// Builds the Decision from the cluster's latest report, so the stored
/// `content_hash` matches what Tier 1 dedup computes for that report.
pub struct RepresentativeSynthesizer {
    default_indicator_ids: Vec<IndicatorId>,
}

impl RepresentativeSynthesizer {
    pub fn new(default_indicator_ids: Vec<IndicatorId>) -> Self {
        Self {
            default_indicator_ids,
        }
    }
}

#[async_trait]
impl EventSynthesizer for RepresentativeSynthesizer {
    async fn synthesize(&self, cluster: &EventCluster) -> Result<DecisionDraft> {
        let rep = cluster
            .representative()
            .ok_or_else(|| anyhow!("Cannot synthesize a Decision from an empty cluster"))?;

        let mut draft = DecisionDraft::builder()
            .title(rep.title.trim())
            .source_url(rep.url.as_str())
            .date(rep.published_at)
            .indicator_ids(self.default_indicator_ids.clone())
            .build();
        draft.summary = rep.summary.clone();
        Ok(draft)
    }
}
