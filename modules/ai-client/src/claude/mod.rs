mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::schema::StructuredOutput;
use client::ClaudeClient;
use types::*;

const STRUCTURED_TOOL: &str = "structured_response";

// =============================================================================
// Claude
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bound every HTTP request made by this client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn client(&self) -> Result<ClaudeClient> {
        let client = ClaudeClient::new(&self.api_key, self.timeout)
            .context("Failed to build Claude HTTP client")?;
        Ok(match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        })
    }

    // =========================================================================
    // Convenience methods
    // =========================================================================

    /// Force a single tool call whose input deserializes into `T`.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let request = ChatRequest::new(&self.model)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .temperature(0.0)
            .forced_tool(ToolDefinitionWire {
                name: STRUCTURED_TOOL.to_string(),
                description: "Return the classification as structured data.".to_string(),
                input_schema: T::tool_schema(),
            });

        let response = self.client()?.chat(&request).await?;

        let input = response
            .tool_input(STRUCTURED_TOOL)
            .ok_or_else(|| anyhow!("No structured output in Claude response"))?;

        serde_json::from_value(input.clone())
            .map_err(|e| anyhow!("Failed to deserialize {}: {}", T::type_name(), e))
    }

    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .max_tokens(4096)
            .temperature(0.0);

        let response = self.client()?.chat(&request).await?;

        response
            .text()
            .ok_or_else(|| anyhow!("No response from Claude"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claude_new() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514");
        assert_eq!(ai.model(), "claude-sonnet-4-20250514");
        assert_eq!(ai.api_key, "sk-ant-test");
        assert!(ai.timeout().is_none());
    }

    #[test]
    fn test_claude_with_base_url() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514")
            .with_base_url("https://custom.api.com");
        assert_eq!(ai.base_url, Some("https://custom.api.com".to_string()));
    }

    #[test]
    fn test_claude_with_timeout() {
        let ai = Claude::new("sk-ant-test", "claude-sonnet-4-20250514")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(ai.timeout(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_surfaces_error() {
        #[derive(serde::Deserialize, schemars::JsonSchema)]
        #[allow(dead_code)]
        struct Verdict {
            ok: bool,
        }

        let ai = Claude::new("sk-ant-test", "claude-test")
            .with_base_url("http://127.0.0.1:9")
            .with_timeout(Duration::from_millis(200));
        let result = ai.extract::<Verdict>("system", "user").await;
        assert!(result.is_err());
    }
}
