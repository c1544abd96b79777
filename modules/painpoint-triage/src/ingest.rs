use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::Path;

use painpoint_common::{Comment, PainpointError};
use serde::Deserialize;
use tracing::{info, warn};

/// One row of the scraper export. Column names follow the export; snake_case
/// spellings are accepted too.
#[derive(Debug, Deserialize)]
struct InputRecord {
    #[serde(rename = "Comment_ID", alias = "comment_id", alias = "id")]
    id: String,
    #[serde(rename = "Raw_Text", alias = "body", alias = "text")]
    body: String,
    #[serde(rename = "Author", alias = "author")]
    author: String,
    #[serde(rename = "Post_ID", alias = "post_id", alias = "thread_id")]
    thread_id: String,
    #[serde(rename = "Subreddit", alias = "subreddit", alias = "community", default)]
    community: Option<String>,
    #[serde(
        rename = "Post_Score",
        alias = "post_score",
        alias = "thread_score",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    thread_score: Option<i64>,
    #[serde(
        rename = "Comment_Score",
        alias = "comment_score",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    comment_score: Option<i64>,
}

impl From<InputRecord> for Comment {
    fn from(r: InputRecord) -> Self {
        Comment {
            id: r.id.trim().to_string(),
            body: r.body,
            thread_id: r.thread_id.trim().to_string(),
            author: r.author.trim().to_string(),
            community: r.community.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            thread_score: r.thread_score,
            comment_score: r.comment_score,
        }
    }
}

/// Load every comment from a CSV export.
///
/// Rows with a blank id are skipped, and a repeated id keeps its first row.
/// Any structural problem (missing file, missing required column, unreadable
/// row) is an input error.
pub fn read_comments(path: &Path) -> Result<Vec<Comment>, PainpointError> {
    let input_err = |e: csv::Error| PainpointError::Input(format!("{}: {e}", path.display()));

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(input_err)?;

    let mut seen = HashSet::new();
    let mut comments = Vec::new();
    let mut skipped = 0u32;

    for record in reader.deserialize::<InputRecord>() {
        let comment = Comment::from(record.map_err(input_err)?);
        if comment.id.is_empty() {
            skipped += 1;
            continue;
        }
        if !seen.insert(comment.id.clone()) {
            warn!(comment_id = %comment.id, "Duplicate comment id, keeping the first row");
            skipped += 1;
            continue;
        }
        comments.push(comment);
    }

    info!(
        comments = comments.len(),
        skipped,
        path = %path.display(),
        "Loaded comments"
    );
    Ok(comments)
}

/// Make sure an output file can be written before any work starts. Creates
/// missing parent directories; never truncates an existing file.
pub fn ensure_writable(path: &Path) -> Result<(), PainpointError> {
    let output_err = |e: std::io::Error| PainpointError::Output(format!("{}: {e}", path.display()));

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(output_err)?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(output_err)?;
    Ok(())
}
