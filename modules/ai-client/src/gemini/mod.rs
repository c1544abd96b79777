mod client;
pub(crate) mod types;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AiError, Result};
use crate::traits::{Completion, JsonPrompt};

use client::{GeminiClient, GEMINI_API_URL};
use types::GenerateRequest;

// =============================================================================
// Gemini Agent
// =============================================================================

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    pub(crate) model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl Gemini {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(120),
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

    pub(crate) fn client(&self) -> GeminiClient {
        let base_url = self.base_url.as_deref().unwrap_or(GEMINI_API_URL);
        GeminiClient::new(&self.api_key, base_url, self.timeout)
    }
}

#[async_trait]
impl Completion for Gemini {
    fn provider(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(&self, prompt: &JsonPrompt) -> Result<String> {
        let request = GenerateRequest::json(&prompt.system, &prompt.user)
            .schema(prompt.response_schema.clone())
            .temperature(prompt.temperature);

        let response = self.client().generate(&self.model, &request).await?;

        response.text().map_err(AiError::EmptyResponse)
    }
}
