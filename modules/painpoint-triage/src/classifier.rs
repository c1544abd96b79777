use std::sync::Arc;
use std::time::Duration;

use ai_client::{extract_json_array, truncate_to_char_boundary, AiError, Completion, JsonPrompt, ResponseSchema};
use async_trait::async_trait;
use painpoint_common::config::ClassifierConfig;
use painpoint_common::{Batch, ClassificationResult, ClassifyError, PainPoint, Sentiment};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// --- BatchClassifier trait ---

/// Classifies one batch as a unit: either every comment gets a result, or the
/// whole batch fails.
#[async_trait]
pub trait BatchClassifier: Send + Sync {
    async fn classify(&self, batch: &Batch) -> Result<Vec<ClassificationResult>, ClassifyError>;
}

/// What the model returns for each comment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawClassification {
    /// Echo of the input id. Optional; results are matched by position.
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(alias = "product_mentioned")]
    pub product: String,
    pub sentiment: String,
    pub pain_point: String,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[derive(Serialize)]
struct PromptComment<'a> {
    comment_id: &'a str,
    text: &'a str,
}

// --- LlmClassifier ---

pub struct LlmClassifier {
    backend: Arc<dyn Completion>,
    instruction: String,
    max_chars_per_comment: usize,
    timeout: Duration,
}

impl LlmClassifier {
    pub fn new(backend: Arc<dyn Completion>, config: &ClassifierConfig, timeout: Duration) -> Self {
        Self {
            backend,
            instruction: build_instruction(config.brief.as_deref(), &config.pain_point_categories),
            max_chars_per_comment: config.max_prompt_chars_per_comment,
            timeout,
        }
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn build_prompt(&self, batch: &Batch) -> Result<JsonPrompt, ClassifyError> {
        let items: Vec<PromptComment<'_>> = batch
            .comments
            .iter()
            .map(|c| PromptComment {
                comment_id: c.id(),
                text: truncate_to_char_boundary(&c.comment.body, self.max_chars_per_comment),
            })
            .collect();

        let payload = serde_json::to_string(&items)
            .map_err(|e| ClassifyError::MalformedResponse(format!("failed to encode batch: {e}")))?;

        let user = format!(
            "Classify these {n} comments. Return exactly {n} objects, in the same order.\n\n{payload}",
            n = batch.len()
        );

        Ok(JsonPrompt::new(&self.instruction, user)
            .with_schema(Vec::<RawClassification>::response_schema()))
    }
}

#[async_trait]
impl BatchClassifier for LlmClassifier {
    async fn classify(&self, batch: &Batch) -> Result<Vec<ClassificationResult>, ClassifyError> {
        let prompt = self.build_prompt(batch)?;

        debug!(
            batch = batch.index,
            comments = batch.len(),
            provider = self.backend.provider(),
            model = self.backend.model(),
            "Sending batch to classifier"
        );

        let raw = tokio::time::timeout(self.timeout, self.backend.complete_json(&prompt))
            .await
            .map_err(|_| {
                ClassifyError::Transport(format!(
                    "classifier call timed out after {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(map_ai_error)?;

        parse_response(batch, &raw)
    }
}

fn map_ai_error(e: AiError) -> ClassifyError {
    if e.is_transport() {
        return ClassifyError::Transport(e.to_string());
    }
    match e {
        AiError::Parse(_) | AiError::EmptyResponse(_) => ClassifyError::MalformedResponse(e.to_string()),
        // The request never left the client.
        AiError::Config(_) => ClassifyError::Transport(format!("client not usable: {e}")),
        other => ClassifyError::Transport(other.to_string()),
    }
}

/// Validate a raw model response against the batch it answers.
///
/// The response must be a JSON array with exactly one object per comment,
/// each carrying `product`, `sentiment` and `pain_point`. Any deviation fails
/// the whole batch.
pub fn parse_response(batch: &Batch, raw: &str) -> Result<Vec<ClassificationResult>, ClassifyError> {
    let array = extract_json_array(raw).ok_or_else(|| {
        ClassifyError::MalformedResponse("response does not contain a JSON array".to_string())
    })?;

    let items: Vec<serde_json::Value> = serde_json::from_str(array)
        .map_err(|e| ClassifyError::MalformedResponse(format!("invalid JSON array: {e}")))?;

    if items.len() != batch.len() {
        return Err(ClassifyError::MalformedResponse(format!(
            "expected {} classifications, got {}",
            batch.len(),
            items.len()
        )));
    }

    batch
        .comments
        .iter()
        .zip(items)
        .enumerate()
        .map(|(position, (comment, item))| {
            let parsed: RawClassification = serde_json::from_value(item).map_err(|e| {
                ClassifyError::MalformedResponse(format!("element {position}: {e}"))
            })?;

            if let Some(echoed) = parsed.comment_id.as_deref() {
                if echoed != comment.id() {
                    warn!(
                        batch = batch.index,
                        position,
                        expected = comment.id(),
                        echoed,
                        "Classifier echoed a different comment id, keeping positional match"
                    );
                }
            }

            let sentiment: Sentiment = parsed.sentiment.parse().map_err(|e| {
                ClassifyError::MalformedResponse(format!("element {position}: {e}"))
            })?;

            let pain_point = parsed.pain_point.trim();
            if pain_point.is_empty() {
                return Err(ClassifyError::MalformedResponse(format!(
                    "element {position}: empty pain_point"
                )));
            }

            Ok(ClassificationResult {
                comment_id: comment.id().to_string(),
                product: parsed.product.trim().to_string(),
                sentiment,
                pain_point: PainPoint::new(pain_point),
                confidence: parsed.confidence.filter(|c| c.is_finite()),
            })
        })
        .collect()
}

pub fn build_instruction(brief: Option<&str>, pain_points: &[String]) -> String {
    let sentiments = Sentiment::ALL
        .iter()
        .map(|s| format!("\"{s}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let categories = pain_points
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let brief = brief
        .map(|b| format!("{}\n\n", b.trim()))
        .unwrap_or_default();

    format!(
        r#"{brief}You analyze public social-media comments about AI products for product and go-to-market research.

You will receive a JSON list of comments, each with a "comment_id" and a "text".
Analyze EACH comment on its own and return a single JSON array with exactly one object per input comment, in the same order as the input.

Each object must have these keys:
- "comment_id": the id of the comment, copied unchanged
- "product": the product the comment is about, or "N/A" if none is mentioned
- "sentiment": one of [{sentiments}]
- "pain_point": one of [{categories}]

Rules:
- Comments may be written in any language. Read them in their original language, but write every value in English.
- A reported bug or malfunction (for example "videos don't open") is "Technical Issue".
- A missing feature the user wants is "Product Gap".
- A real complaint that fits no category is "Other".
- If there is no pain point, use "N/A". Do not invent one.
- Return only the JSON array. No prose, no markdown."#
    )
}
