mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AiError, Result};
use crate::traits::{Completion, JsonPrompt};

use client::{ClaudeClient, ANTHROPIC_API_URL};
use types::*;

// =============================================================================
// Claude Agent
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Duration,
    max_tokens: u32,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(120),
            max_tokens: 8192,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub(crate) fn client(&self) -> ClaudeClient {
        let base_url = self.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);
        ClaudeClient::new(&self.api_key, base_url, self.timeout)
    }
}

// =============================================================================
// Completion Implementation
// =============================================================================

#[async_trait]
impl Completion for Claude {
    fn provider(&self) -> &'static str {
        "claude"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &JsonPrompt) -> Result<String> {
        // The Messages API has no JSON mode; the system prompt carries the contract.
        let request = ChatRequest::new(&self.model)
            .system(&prompt.system)
            .message(WireMessage::user(&prompt.user))
            .max_tokens(self.max_tokens)
            .temperature(prompt.temperature);

        let response = self.client().chat(&request).await?;

        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Claude usage"
            );
        }
        if response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(AiError::EmptyResponse(
                "Claude response truncated at max_tokens".to_string(),
            ));
        }

        response
            .text()
            .ok_or_else(|| AiError::EmptyResponse("no text block in Claude response".to_string()))
    }
}
