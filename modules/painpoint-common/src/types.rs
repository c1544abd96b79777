use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Comments ---

/// A public comment as exported by the upstream scraper. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub body: String,
    /// The post/thread the comment was left under.
    pub thread_id: String,
    pub author: String,
    /// Community the thread belongs to (e.g. a subreddit name).
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub thread_score: Option<i64>,
    #[serde(default)]
    pub comment_score: Option<i64>,
}

/// A comment after relevance triage. Derived, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredComment {
    pub comment: Comment,
    pub relevant: bool,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
}

impl FilteredComment {
    pub fn id(&self) -> &str {
        &self.comment.id
    }
}

/// An ordered group of relevant comments sent to the classifier in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub comments: Vec<FilteredComment>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn comment_ids(&self) -> Vec<&str> {
        self.comments.iter().map(|c| c.id()).collect()
    }
}

// --- Classification ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Negative => write!(f, "Negative"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Mixed => write!(f, "Mixed"),
        }
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "mixed" => Ok(Sentiment::Mixed),
            other => Err(format!("unknown sentiment '{other}'")),
        }
    }
}

/// Pain-point label. The category list sent to the model is guidance only;
/// any non-empty label the model returns is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PainPoint(String);

impl PainPoint {
    pub const NOT_APPLICABLE: &'static str = "N/A";

    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_not_applicable(&self) -> bool {
        self.0.eq_ignore_ascii_case(Self::NOT_APPLICABLE)
    }
}

impl fmt::Display for PainPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default pain-point taxonomy used when the config does not provide one.
pub const DEFAULT_PAIN_POINTS: &[&str] = &[
    "Censorship",
    "Accuracy/Hallucination",
    "Speed",
    "Cost/Access",
    "Data Privacy",
    "Woke/Bias",
    "Technical Issue",
    "Product Gap",
    "Other",
    PainPoint::NOT_APPLICABLE,
];

/// One successfully classified comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub comment_id: String,
    pub product: String,
    pub sentiment: Sentiment,
    pub pain_point: PainPoint,
    #[serde(default)]
    pub confidence: Option<f32>,
}

// --- Failures ---

/// A batch the classifier could not handle, kept whole for an out-of-band re-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedBatch {
    pub batch: Batch,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl FailedBatch {
    pub fn new(batch: Batch, error: impl Into<String>) -> Self {
        Self {
            batch,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}

// --- Report ---

/// Final output row: comment metadata joined with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub comment_id: String,
    pub thread_id: String,
    pub community: Option<String>,
    pub author: String,
    pub thread_score: Option<i64>,
    pub comment_score: Option<i64>,
    pub product: String,
    pub sentiment: Sentiment,
    pub pain_point: PainPoint,
    pub confidence: Option<f32>,
    pub body: String,
}

impl ReportRow {
    pub fn join(comment: &Comment, result: &ClassificationResult) -> Self {
        Self {
            comment_id: comment.id.clone(),
            thread_id: comment.thread_id.clone(),
            community: comment.community.clone(),
            author: comment.author.clone(),
            thread_score: comment.thread_score,
            comment_score: comment.comment_score,
            product: result.product.clone(),
            sentiment: result.sentiment,
            pain_point: result.pain_point.clone(),
            confidence: result.confidence,
            body: comment.body.clone(),
        }
    }
}
