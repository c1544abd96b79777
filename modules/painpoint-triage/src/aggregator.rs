use std::collections::HashMap;
use std::path::Path;

use painpoint_common::{ClassificationResult, Comment, PainpointError, ReportRow};
use tracing::{info, warn};

pub const REPORT_HEADERS: [&str; 11] = [
    "comment_id",
    "thread_id",
    "community",
    "author",
    "thread_score",
    "comment_score",
    "product",
    "sentiment",
    "pain_point",
    "confidence",
    "body",
];

/// Join classification results back onto their comments.
///
/// Rows come out in input order, one per classified comment. Comments without
/// a result are left out; results whose id matches no comment are dropped
/// with a warning. Pure, so calling it twice on the same input gives the same
/// rows.
pub fn merge(comments: &[Comment], results: &[ClassificationResult]) -> Vec<ReportRow> {
    let mut by_id: HashMap<&str, &ClassificationResult> = HashMap::with_capacity(results.len());
    for result in results {
        if by_id.insert(result.comment_id.as_str(), result).is_some() {
            warn!(comment_id = %result.comment_id, "Duplicate classification, keeping the later one");
        }
    }

    let mut rows = Vec::with_capacity(by_id.len());
    for comment in comments {
        if let Some(result) = by_id.remove(comment.id.as_str()) {
            rows.push(ReportRow::join(comment, result));
        }
    }

    for orphan in by_id.keys() {
        warn!(comment_id = %orphan, "Classification has no matching comment");
    }

    rows
}

/// Write the report, replacing any previous file at `path`.
pub fn write_report(path: &Path, rows: &[ReportRow]) -> Result<(), PainpointError> {
    let output_err = |e: csv::Error| PainpointError::Output(format!("{}: {e}", path.display()));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(output_err)?;
    writer.write_record(REPORT_HEADERS).map_err(output_err)?;
    for row in rows {
        writer.serialize(row).map_err(output_err)?;
    }
    writer.flush()?;

    info!(rows = rows.len(), path = %path.display(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{comment, result};
    use painpoint_common::Sentiment;

    fn comments() -> Vec<Comment> {
        vec![
            comment("c1", "grok is slow", "alice"),
            comment("c2", "gemini refuses everything", "bob"),
            comment("c3", "claude made up a citation", "carol"),
        ]
    }

    #[test]
    fn rows_follow_input_order() {
        let results = vec![
            result("c3", "claude", Sentiment::Negative, "Accuracy/Hallucination"),
            result("c1", "grok", Sentiment::Negative, "Speed"),
        ];

        let rows = merge(&comments(), &results);

        let ids: Vec<&str> = rows.iter().map(|r| r.comment_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert_eq!(rows[0].author, "alice");
        assert_eq!(rows[1].pain_point.as_str(), "Accuracy/Hallucination");
    }

    #[test]
    fn orphan_results_are_dropped() {
        let results = vec![result("ghost", "grok", Sentiment::Neutral, "N/A")];
        assert!(merge(&comments(), &results).is_empty());
    }

    #[test]
    fn merge_is_idempotent() {
        let results = vec![
            result("c1", "grok", Sentiment::Negative, "Speed"),
            result("c2", "gemini", Sentiment::Negative, "Censorship"),
        ];

        assert_eq!(merge(&comments(), &results), merge(&comments(), &results));
    }

    #[test]
    fn report_has_header_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");

        write_report(&path, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), REPORT_HEADERS.join(","));
    }

    #[test]
    fn report_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let results = vec![
            result("c1", "grok", Sentiment::Negative, "Speed"),
            result("c2", "gemini", Sentiment::Mixed, "Censorship"),
        ];
        let rows = merge(&comments(), &results);

        write_report(&path, &rows).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        write_report(&path, &rows).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let back: Vec<ReportRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(back, rows);
    }
}
