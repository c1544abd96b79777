// Test mocks for the triage pipeline.
//
// Three mocks matching the trait boundaries:
// - ScriptedCompletion (ai_client::Completion): queued provider replies
// - MockClassifier (BatchClassifier): per-batch failures, per-comment answers
// - MemoryDeadLetter (DeadLetterSink): in-memory failure log
//
// Plus builders for comments, batches, results and triage config.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ai_client::{AiError, Completion, JsonPrompt};
use async_trait::async_trait;
use painpoint_common::config::TriageConfig;
use painpoint_common::{
    Batch, ClassificationResult, ClassifyError, Comment, FailedBatch, FilteredComment, PainPoint,
    Sentiment,
};

use crate::classifier::BatchClassifier;
use crate::dead_letter::DeadLetterSink;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn comment(id: &str, body: &str, author: &str) -> Comment {
    Comment {
        id: id.to_string(),
        body: body.to_string(),
        thread_id: "t1".to_string(),
        author: author.to_string(),
        community: None,
        thread_score: None,
        comment_score: None,
    }
}

pub fn filtered(id: &str, body: &str) -> FilteredComment {
    FilteredComment {
        comment: comment(id, body, "someone"),
        relevant: true,
        matched_keywords: Vec::new(),
    }
}

/// A batch from `(id, body)` pairs.
pub fn batch_of(index: usize, comments: &[(&str, &str)]) -> Batch {
    Batch {
        index,
        comments: comments.iter().map(|(id, body)| filtered(id, body)).collect(),
    }
}

pub fn result(id: &str, product: &str, sentiment: Sentiment, pain_point: &str) -> ClassificationResult {
    ClassificationResult {
        comment_id: id.to_string(),
        product: product.to_string(),
        sentiment,
        pain_point: PainPoint::new(pain_point),
        confidence: None,
    }
}

/// Triage config with the given brand keywords and default exclusions.
pub fn triage_config(brands: &[&str]) -> TriageConfig {
    TriageConfig {
        brand_keywords: brands.iter().map(|s| s.to_string()).collect(),
        symptom_keywords: Vec::new(),
        excluded_authors: vec!["bot".to_string(), "automoderator".to_string()],
        placeholder_bodies: vec!["[deleted]".to_string(), "[removed]".to_string()],
        max_comment_chars: None,
    }
}

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Replies with queued responses in order; errors once the queue runs dry.
/// Builder pattern: `.then_ok()`, `.then_err()`, `.with_delay()`.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, AiError>>>,
    prompts: Mutex<Vec<JsonPrompt>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn then_ok(self, body: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(body.to_string()));
        self
    }

    pub fn then_err(self, error: AiError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<JsonPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    fn provider(&self) -> &'static str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn complete_json(&self, prompt: &JsonPrompt) -> ai_client::Result<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::EmptyResponse("script exhausted".to_string())))
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Answers every comment unless told otherwise. Comments without a scripted
/// answer get `product = "N/A"`, `Neutral`, `N/A`.
pub struct MockClassifier {
    failures: HashMap<usize, ClassifyError>,
    answers: HashMap<String, ClassificationResult>,
    calls: AtomicUsize,
    batches_seen: Mutex<Vec<usize>>,
    delay: Option<Duration>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            answers: HashMap::new(),
            calls: AtomicUsize::new(0),
            batches_seen: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep this long inside every call, to keep a batch in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_batch(mut self, index: usize, error: ClassifyError) -> Self {
        self.failures.insert(index, error);
        self
    }

    pub fn answer(mut self, result: ClassificationResult) -> Self {
        self.answers.insert(result.comment_id.clone(), result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn batches_seen(&self) -> Vec<usize> {
        self.batches_seen.lock().unwrap().clone()
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchClassifier for MockClassifier {
    async fn classify(&self, batch: &Batch) -> Result<Vec<ClassificationResult>, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches_seen.lock().unwrap().push(batch.index);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.get(&batch.index) {
            return Err(err.clone());
        }

        Ok(batch
            .comments
            .iter()
            .map(|c| {
                self.answers
                    .get(c.id())
                    .cloned()
                    .unwrap_or_else(|| result(c.id(), "N/A", Sentiment::Neutral, PainPoint::NOT_APPLICABLE))
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryDeadLetter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDeadLetter {
    records: Mutex<Vec<FailedBatch>>,
}

impl MemoryDeadLetter {
    pub fn recorded(&self) -> Vec<FailedBatch> {
        self.records.lock().unwrap().clone()
    }
}

impl DeadLetterSink for MemoryDeadLetter {
    fn record(&self, failed: &FailedBatch) {
        self.records.lock().unwrap().push(failed.clone());
    }
}
