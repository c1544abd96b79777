use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::PainpointError;
use crate::types::DEFAULT_PAIN_POINTS;

/// TOML-backed run configuration. Secrets (API keys) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub triage: TriageConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    #[serde(default)]
    pub brand_keywords: Vec<String>,
    #[serde(default)]
    pub symptom_keywords: Vec<String>,
    /// Case-insensitive substrings; an author containing any of them is dropped.
    #[serde(default = "default_excluded_authors")]
    pub excluded_authors: Vec<String>,
    /// Bodies the source platform leaves behind for removed content.
    #[serde(default = "default_placeholder_bodies")]
    pub placeholder_bodies: Vec<String>,
    /// Comments at or above this many characters are dropped before matching.
    #[serde(default)]
    pub max_comment_chars: Option<usize>,
}

impl TriageConfig {
    /// Brand names ∪ symptom terms, in config order, duplicates removed.
    pub fn keywords(&self) -> Vec<String> {
        let mut all: Vec<String> = Vec::new();
        for kw in self.brand_keywords.iter().chain(&self.symptom_keywords) {
            if !all.iter().any(|k| k.eq_ignore_ascii_case(kw)) {
                all.push(kw.clone());
            }
        }
        all
    }
}

/// One day.
pub const MAX_INTER_BATCH_DELAY_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Minimum spacing between classifier dispatches.
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_secs: f64,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Classifier calls allowed in flight at once. 1 means fully sequential.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_secs: default_inter_batch_delay(),
            call_timeout_secs: default_call_timeout(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl BatchingConfig {
    /// Capped at [`MAX_INTER_BATCH_DELAY_SECS`]; negative values mean no delay.
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.inter_batch_delay_secs.min(MAX_INTER_BATCH_DELAY_SECS))
            .unwrap_or(Duration::ZERO)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Claude,
}

impl Provider {
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    #[serde(default = "default_provider")]
    pub provider: Provider,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional framing prepended to the fixed instruction (who the analyst
    /// works for, which products are competitors).
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default = "default_pain_points")]
    pub pain_point_categories: Vec<String>,
    /// Comment text longer than this is cut (at a char boundary) before sending.
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars_per_comment: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            brief: None,
            pain_point_categories: default_pain_points(),
            max_prompt_chars_per_comment: default_max_prompt_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_failed_batches")]
    pub failed_batches: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            failed_batches: default_failed_batches(),
        }
    }
}

fn default_excluded_authors() -> Vec<String> {
    vec!["bot".to_string(), "automoderator".to_string()]
}
fn default_placeholder_bodies() -> Vec<String> {
    vec!["[deleted]".to_string(), "[removed]".to_string()]
}
fn default_batch_size() -> usize {
    50
}
fn default_inter_batch_delay() -> f64 {
    10.0
}
fn default_call_timeout() -> u64 {
    120
}
fn default_max_in_flight() -> usize {
    1
}
fn default_provider() -> Provider {
    Provider::Gemini
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_pain_points() -> Vec<String> {
    DEFAULT_PAIN_POINTS.iter().map(|s| s.to_string()).collect()
}
fn default_max_prompt_chars() -> usize {
    3000
}
fn default_input() -> PathBuf {
    PathBuf::from("data/raw_comments.csv")
}
fn default_output() -> PathBuf {
    PathBuf::from("data/final_analysis.csv")
}
fn default_failed_batches() -> PathBuf {
    PathBuf::from("data/failed_batches.csv")
}

impl FileConfig {
    /// Load, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, PainpointError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PainpointError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            PainpointError::Config(msg) => {
                PainpointError::Config(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, PainpointError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| PainpointError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PainpointError> {
        let b = &self.batching;
        if b.batch_size == 0 {
            return Err(PainpointError::Config("batching.batch_size must be at least 1".into()));
        }
        if b.call_timeout_secs == 0 {
            return Err(PainpointError::Config(
                "batching.call_timeout_secs must be greater than 0".into(),
            ));
        }
        if b.max_in_flight == 0 {
            return Err(PainpointError::Config("batching.max_in_flight must be at least 1".into()));
        }
        if !(0.0..=MAX_INTER_BATCH_DELAY_SECS).contains(&b.inter_batch_delay_secs) {
            return Err(PainpointError::Config(format!(
                "batching.inter_batch_delay_secs must be between 0 and {MAX_INTER_BATCH_DELAY_SECS}"
            )));
        }
        if self.classifier.model.trim().is_empty() {
            return Err(PainpointError::Config("classifier.model must not be empty".into()));
        }
        if self.classifier.max_prompt_chars_per_comment == 0 {
            return Err(PainpointError::Config(
                "classifier.max_prompt_chars_per_comment must be at least 1".into(),
            ));
        }
        if self.triage.keywords().is_empty() {
            tracing::warn!("No triage keywords configured; every comment will be filtered out");
        }
        Ok(())
    }
}

/// Secrets loaded from the environment (and `.env`, if present).
#[derive(Clone)]
pub struct Secrets {
    pub provider: Provider,
    pub api_key: String,
}

impl Secrets {
    /// Fails when the key for the configured provider is missing or empty.
    pub fn from_env(provider: Provider) -> Result<Self, PainpointError> {
        dotenvy::dotenv().ok();

        let var = provider.api_key_var();
        let api_key = env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                PainpointError::Config(format!("{var} environment variable is required"))
            })?;

        let secrets = Self { provider, api_key };
        secrets.log_redacted();
        Ok(secrets)
    }

    pub fn log_redacted(&self) {
        let n = self.api_key.len().min(5);
        let prefix = self.api_key.get(..n).unwrap_or("");
        tracing::info!(
            "  {}: {}...({} chars)",
            self.provider.api_key_var(),
            prefix,
            self.api_key.len()
        );
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
