// Claude-backed Classifier. Each capability is a single forced tool call whose
// input deserializes into one of the response structs below.

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use ai_client::Claude;
use verdict_common::text::truncate_bytes;
use verdict_common::Sentiment;

use crate::traits::Classifier;

const MAX_INPUT_BYTES: usize = 4_000;

const DUPLICATE_SYSTEM_PROMPT: &str = "You compare two news reports about public decisions \
(laws, policies, official announcements). Answer whether both reports describe the same \
real-world decision by the same actor. Different coverage, wording or language of the same \
decision counts as the same. Related but distinct decisions do not.";

const SENTIMENT_SYSTEM_PROMPT: &str = "You label the sentiment of a news report about a \
public decision as it would be perceived by the people affected: positive, negative or \
neutral.";

const IMPORTANCE_SYSTEM_PROMPT: &str = "You rate how newsworthy a public decision is on a \
scale from 0 (trivial) to 100 (historic), considering how many people it affects and how \
lasting its consequences are.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DuplicateJudgment {
    /// True when both reports describe the same decision.
    pub same_decision: bool,
    /// One sentence explaining the judgment.
    pub reason: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SentimentLabel {
    pub sentiment: Sentiment,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ImportanceScore {
    /// 0 to 100
    pub score: f64,
}

pub struct ClaudeClassifier {
    claude: Claude,
}

impl ClaudeClassifier {
    pub fn new(claude: Claude) -> Self {
        Self { claude }
    }
}

fn report(title: &str, summary: Option<&str>) -> String {
    let text = match summary {
        Some(s) if !s.trim().is_empty() => format!("Title: {title}\nSummary: {s}"),
        _ => format!("Title: {title}"),
    };
    truncate_bytes(&text, MAX_INPUT_BYTES).to_string()
}

#[async_trait]
impl Classifier for ClaudeClassifier {
    async fn judge_duplicate(&self, candidate: &str, existing: &str) -> Result<bool> {
        let user = format!(
            "Report A:\n{}\n\nReport B:\n{}",
            truncate_bytes(candidate, MAX_INPUT_BYTES),
            truncate_bytes(existing, MAX_INPUT_BYTES),
        );
        let judgment: DuplicateJudgment =
            self.claude.extract(DUPLICATE_SYSTEM_PROMPT, user).await?;
        debug!(
            same = judgment.same_decision,
            reason = judgment.reason.as_str(),
            "Duplicate judgment"
        );
        Ok(judgment.same_decision)
    }

    async fn classify_sentiment(&self, title: &str, summary: Option<&str>) -> Result<Sentiment> {
        let label: SentimentLabel = self
            .claude
            .extract(SENTIMENT_SYSTEM_PROMPT, report(title, summary))
            .await?;
        Ok(label.sentiment)
    }

    async fn score_importance(&self, title: &str, summary: Option<&str>) -> Result<Option<f64>> {
        let scored: ImportanceScore = self
            .claude
            .extract(IMPORTANCE_SYSTEM_PROMPT, report(title, summary))
            .await?;
        Ok(Some(scored.score.clamp(0.0, 100.0)))
    }
}
