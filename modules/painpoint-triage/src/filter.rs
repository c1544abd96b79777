use painpoint_common::config::TriageConfig;
use painpoint_common::{Comment, FilteredComment};
use tracing::{debug, info};

use crate::text::normalize_for_triage;

/// Why a comment did not pass triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyBody,
    Placeholder,
    ExcludedAuthor,
    TooLong,
    NoKeyword,
}

#[derive(Debug, Clone, PartialEq)]
struct Keyword {
    term: String,
    normalized: String,
}

/// Keyword gate in front of the classifier. Fail-closed: with no keywords
/// configured, nothing passes.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<Keyword>,
    excluded_authors: Vec<String>,
    placeholder_bodies: Vec<String>,
    max_comment_chars: Option<usize>,
}

/// Per-reason counts from one triage pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TriageCounts {
    pub total: u32,
    pub empty: u32,
    pub placeholder: u32,
    pub excluded_author: u32,
    pub too_long: u32,
    pub no_keyword: u32,
    pub relevant: u32,
}

impl TriageCounts {
    fn record(&mut self, outcome: Result<(), Rejection>) {
        self.total += 1;
        match outcome {
            Ok(()) => self.relevant += 1,
            Err(Rejection::EmptyBody) => self.empty += 1,
            Err(Rejection::Placeholder) => self.placeholder += 1,
            Err(Rejection::ExcludedAuthor) => self.excluded_author += 1,
            Err(Rejection::TooLong) => self.too_long += 1,
            Err(Rejection::NoKeyword) => self.no_keyword += 1,
        }
    }
}

impl RelevanceFilter {
    pub fn new(config: &TriageConfig) -> Self {
        let keywords = config
            .keywords()
            .into_iter()
            .filter_map(|term| {
                let normalized = normalize_for_triage(&term);
                // A term that normalizes to nothing would match every comment.
                (!normalized.is_empty()).then_some(Keyword { term, normalized })
            })
            .collect();

        Self {
            keywords,
            excluded_authors: config
                .excluded_authors
                .iter()
                .map(|a| a.trim().to_lowercase())
                .filter(|a| !a.is_empty())
                .collect(),
            placeholder_bodies: config
                .placeholder_bodies
                .iter()
                .map(|b| b.trim().to_lowercase())
                .collect(),
            max_comment_chars: config.max_comment_chars,
        }
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    /// Keep only relevant comments, in input order, and count the rest by reason.
    pub fn relevant(&self, comments: Vec<Comment>) -> (Vec<FilteredComment>, TriageCounts) {
        let mut counts = TriageCounts::default();
        let mut kept = Vec::new();

        for comment in comments {
            match self.check(&comment) {
                Ok(matched_keywords) => {
                    counts.record(Ok(()));
                    kept.push(FilteredComment {
                        comment,
                        relevant: true,
                        matched_keywords,
                    });
                }
                Err(reason) => {
                    debug!(comment_id = comment.id.as_str(), ?reason, "Comment dropped by triage");
                    counts.record(Err(reason));
                }
            }
        }

        info!(
            total = counts.total,
            relevant = counts.relevant,
            excluded_author = counts.excluded_author,
            no_keyword = counts.no_keyword,
            "Triage complete"
        );
        (kept, counts)
    }

    /// Matched keywords (original spelling) or the first rejection reason.
    pub fn check(&self, comment: &Comment) -> Result<Vec<String>, Rejection> {
        let body = comment.body.trim();
        if body.is_empty() {
            return Err(Rejection::EmptyBody);
        }
        let body_lower = body.to_lowercase();
        if self.placeholder_bodies.iter().any(|p| *p == body_lower) {
            return Err(Rejection::Placeholder);
        }

        let author = comment.author.to_lowercase();
        if self.excluded_authors.iter().any(|a| author.contains(a.as_str())) {
            return Err(Rejection::ExcludedAuthor);
        }

        if let Some(max) = self.max_comment_chars {
            if comment.body.chars().count() >= max {
                return Err(Rejection::TooLong);
            }
        }

        if self.keywords.is_empty() {
            return Err(Rejection::NoKeyword);
        }

        let normalized = normalize_for_triage(body);
        let matched: Vec<String> = self
            .keywords
            .iter()
            .filter(|k| normalized.contains(k.normalized.as_str()))
            .map(|k| k.term.clone())
            .collect();

        if matched.is_empty() {
            Err(Rejection::NoKeyword)
        } else {
            Ok(matched)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::comment;

    fn config(brands: &[&str], symptoms: &[&str]) -> TriageConfig {
        TriageConfig {
            brand_keywords: brands.iter().map(|s| s.to_string()).collect(),
            symptom_keywords: symptoms.iter().map(|s| s.to_string()).collect(),
            excluded_authors: vec!["bot".into(), "automoderator".into()],
            placeholder_bodies: vec!["[deleted]".into(), "[removed]".into()],
            max_comment_chars: Some(3000),
        }
    }

    #[test]
    fn empty_keyword_set_passes_nothing() {
        let filter = RelevanceFilter::new(&config(&[], &[]));
        let comments = vec![
            comment("c1", "grok is great", "alice"),
            comment("c2", "anything at all", "bob"),
        ];

        let (kept, counts) = filter.relevant(comments);

        assert!(kept.is_empty());
        assert_eq!(counts.no_keyword, 2);
        assert_eq!(counts.relevant, 0);
    }

    #[test]
    fn punctuation_only_keywords_are_ignored() {
        let filter = RelevanceFilter::new(&config(&["!!!"], &[]));
        assert_eq!(filter.keyword_count(), 0);
        assert_eq!(
            filter.check(&comment("c1", "wow!!!", "alice")),
            Err(Rejection::NoKeyword)
        );
    }

    #[test]
    fn matches_case_insensitively_and_reports_terms() {
        let filter = RelevanceFilter::new(&config(&["ChatGPT", "grok"], &["too expensive"]));
        let matched = filter.check(&comment("c1", "CHATGPT is Too  Expensive.", "alice"));

        assert_eq!(
            matched,
            Ok(vec!["ChatGPT".to_string(), "too expensive".to_string()])
        );
    }

    #[test]
    fn bots_are_excluded_even_when_relevant() {
        let filter = RelevanceFilter::new(&config(&["grok"], &[]));
        assert_eq!(
            filter.check(&comment("c1", "grok rules", "AutoModerator")),
            Err(Rejection::ExcludedAuthor)
        );
        assert_eq!(
            filter.check(&comment("c2", "grok rules", "SummaryBot")),
            Err(Rejection::ExcludedAuthor)
        );
    }

    #[test]
    fn empty_and_placeholder_bodies_are_dropped() {
        let filter = RelevanceFilter::new(&config(&["grok"], &[]));
        assert_eq!(filter.check(&comment("c1", "   ", "alice")), Err(Rejection::EmptyBody));
        assert_eq!(
            filter.check(&comment("c2", "[deleted]", "alice")),
            Err(Rejection::Placeholder)
        );
    }

    #[test]
    fn overlong_comments_are_dropped() {
        let mut cfg = config(&["grok"], &[]);
        cfg.max_comment_chars = Some(10);
        let filter = RelevanceFilter::new(&cfg);

        assert_eq!(
            filter.check(&comment("c1", "grok grok grok", "alice")),
            Err(Rejection::TooLong)
        );
        assert!(filter.check(&comment("c2", "grok", "alice")).is_ok());
    }

    #[test]
    fn keywords_inside_urls_do_not_count() {
        let filter = RelevanceFilter::new(&config(&["grok"], &[]));
        assert_eq!(
            filter.check(&comment("c1", "look at https://x.ai/grok", "alice")),
            Err(Rejection::NoKeyword)
        );
    }

    #[test]
    fn relevant_preserves_order_and_counts() {
        let filter = RelevanceFilter::new(&config(&["grok"], &[]));
        let comments = vec![
            comment("c1", "grok one", "alice"),
            comment("c2", "nothing", "bob"),
            comment("c3", "grok three", "carol"),
            comment("c4", "grok four", "helperbot"),
        ];

        let (kept, counts) = filter.relevant(comments);

        let ids: Vec<&str> = kept.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert_eq!(
            counts,
            TriageCounts {
                total: 4,
                no_keyword: 1,
                excluded_author: 1,
                relevant: 2,
                ..Default::default()
            }
        );
    }
}
