//! Text normalization used only for relevance matching. The comment body that
//! reaches the classifier and the report is never altered.

use regex::Regex;
use std::sync::LazyLock;

static MARKDOWN_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").unwrap());
static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize text for keyword triage.
///
/// Markdown links keep their label, bare URLs are dropped, everything is
/// lower-cased, punctuation is removed (so `don't` becomes `dont`) and runs of
/// whitespace collapse to a single space. Letters outside ASCII are kept so
/// non-English terms still match.
pub fn normalize_for_triage(text: &str) -> String {
    let text = MARKDOWN_LINK_RE.replace_all(text, "$1");
    let text = URL_RE.replace_all(&text, " ");
    let text = text.to_lowercase();
    let text = PUNCTUATION_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}
