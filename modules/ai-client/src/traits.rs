use async_trait::async_trait;

use crate::error::Result;

// =============================================================================
// Prompt
// =============================================================================

/// A single-turn request that must be answered with a JSON document.
#[derive(Debug, Clone)]
pub struct JsonPrompt {
    pub system: String,
    pub user: String,
    /// Optional response schema. Providers that cannot enforce one ignore it.
    pub response_schema: Option<serde_json::Value>,
    pub temperature: f32,
}

impl JsonPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            response_schema: None,
            temperature: 0.0,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

// =============================================================================
// Completion Trait
// =============================================================================

/// A provider that turns a [`JsonPrompt`] into raw response text.
///
/// Implementations own transport concerns only (auth, timeouts, status
/// mapping). Validating the returned JSON is the caller's job.
#[async_trait]
pub trait Completion: Send + Sync {
    fn provider(&self) -> &'static str;
    fn model(&self) -> &str;
    async fn complete_json(&self, prompt: &JsonPrompt) -> Result<String>;
}
