//! End-to-end runs through the real classifier, dead-letter file and report
//! writer, with the provider replaced by scripted replies.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ai_client::AiError;
use painpoint_common::config::{BatchingConfig, ClassifierConfig};
use painpoint_common::{ClassifyError, Comment, ReportRow, Sentiment};
use painpoint_triage::aggregator::{merge, write_report};
use painpoint_triage::testing::{comment, triage_config, MockClassifier, ScriptedCompletion};
use painpoint_triage::{load_failed_batches, CsvDeadLetter, LlmClassifier, Pipeline};

fn batching(batch_size: usize) -> BatchingConfig {
    BatchingConfig {
        batch_size,
        inter_batch_delay_secs: 0.0,
        call_timeout_secs: 5,
        max_in_flight: 1,
    }
}

fn llm_pipeline(backend: ScriptedCompletion, failed: &Path) -> Pipeline {
    let classifier = LlmClassifier::new(
        Arc::new(backend),
        &ClassifierConfig::default(),
        Duration::from_secs(5),
    );
    Pipeline::new(
        &triage_config(&["grok", "chatgpt", "claude"]),
        &batching(50),
        Arc::new(classifier),
        Arc::new(CsvDeadLetter::new(failed)),
    )
}

fn read_report(path: &Path) -> Vec<ReportRow> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .map(|r| r.unwrap())
        .collect()
}

const THREE_OK: &str = r#"[
    {"comment_id": "c1", "product": "grok", "sentiment": "Negative", "pain_point": "Speed"},
    {"comment_id": "c2", "product": "chatgpt", "sentiment": "Negative", "pain_point": "Accuracy/Hallucination"},
    {"comment_id": "c3", "product": "claude", "sentiment": "Positive", "pain_point": "N/A"}
]"#;

fn three_comments() -> Vec<Comment> {
    vec![
        comment("c1", "grok takes forever to answer", "alice"),
        comment("c2", "chatgpt invented a court case", "bob"),
        comment("c3", "claude is great for code", "carol"),
    ]
}

#[tokio::test]
async fn three_comments_three_results_no_failures() {
    let dir = tempfile::tempdir().unwrap();
    let failed = dir.path().join("failed.csv");
    let output = dir.path().join("report.csv");
    let pipeline = llm_pipeline(ScriptedCompletion::new().then_ok(THREE_OK), &failed);

    let outcome = pipeline.run(three_comments()).await;
    write_report(&output, &outcome.rows).unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.failed.is_empty());
    assert!(load_failed_batches(&failed).unwrap().is_empty());

    let rows = read_report(&output);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].product, "grok");
    assert_eq!(rows[1].pain_point.as_str(), "Accuracy/Hallucination");
    assert_eq!(rows[2].sentiment, Sentiment::Positive);
    assert_eq!(rows[2].author, "carol");
}

#[tokio::test]
async fn transport_error_dead_letters_the_whole_batch() {
    let dir = tempfile::tempdir().unwrap();
    let failed = dir.path().join("failed.csv");
    let backend = ScriptedCompletion::new().then_err(AiError::Api {
        status: 503,
        message: "overloaded".into(),
    });
    let pipeline = llm_pipeline(backend, &failed);

    let outcome = pipeline.run(three_comments()).await;

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.stats.transport_errors, 1);

    let logged = load_failed_batches(&failed).unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].batch.comment_ids(), vec!["c1", "c2", "c3"]);
    assert!(logged[0].error.starts_with("Transport error"), "{}", logged[0].error);
}

#[tokio::test]
async fn length_mismatch_is_a_batch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let failed = dir.path().join("failed.csv");
    let two = r#"[
        {"product": "grok", "sentiment": "Negative", "pain_point": "Speed"},
        {"product": "chatgpt", "sentiment": "Negative", "pain_point": "Speed"}
    ]"#;
    let pipeline = llm_pipeline(ScriptedCompletion::new().then_ok(two), &failed);

    let outcome = pipeline.run(three_comments()).await;

    assert!(outcome.rows.is_empty());
    assert_eq!(outcome.stats.malformed_responses, 1);
    assert_eq!(load_failed_batches(&failed).unwrap()[0].batch.len(), 3);
}

#[tokio::test]
async fn non_english_technical_issue_reaches_the_report_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let body = "Los videos de Grok no abren desde ayer, ¿alguien más?";
    let reply = r#"[{"comment_id": "es1", "product": "grok", "sentiment": "Negative", "pain_point": "Technical Issue"}]"#;
    let pipeline = llm_pipeline(
        ScriptedCompletion::new().then_ok(reply),
        &dir.path().join("failed.csv"),
    );

    let outcome = pipeline.run(vec![comment("es1", body, "usuario")]).await;

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].body, body);
    assert_eq!(outcome.rows[0].pain_point.as_str(), "Technical Issue");
}

#[tokio::test]
async fn every_relevant_comment_lands_in_report_or_failure_log() {
    let dir = tempfile::tempdir().unwrap();
    let failed = dir.path().join("failed.csv");
    let mock = MockClassifier::new().fail_batch(1, ClassifyError::Transport("timeout".into()));
    let pipeline = Pipeline::new(
        &triage_config(&["grok"]),
        &batching(2),
        Arc::new(mock),
        Arc::new(CsvDeadLetter::new(&failed)),
    );
    let mut comments: Vec<Comment> = (0..7)
        .map(|i| comment(&format!("g{i}"), "grok again", "someone"))
        .collect();
    comments.push(comment("bot1", "grok grok grok", "grok_bot"));
    comments.push(comment("off", "unrelated", "someone"));

    let outcome = pipeline.run(comments).await;

    let mut seen: Vec<String> = outcome.rows.iter().map(|r| r.comment_id.clone()).collect();
    for f in load_failed_batches(&failed).unwrap() {
        seen.extend(f.batch.comment_ids().into_iter().map(String::from));
    }
    seen.sort();
    let expected: Vec<String> = (0..7).map(|i| format!("g{i}")).collect();
    assert_eq!(seen, expected);
    assert!(outcome.stats.is_accounted());
}

#[tokio::test]
async fn empty_keyword_config_passes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockClassifier::new());
    let pipeline = Pipeline::new(
        &triage_config(&[]),
        &batching(50),
        mock.clone(),
        Arc::new(CsvDeadLetter::new(dir.path().join("failed.csv"))),
    );

    let outcome = pipeline.run(three_comments()).await;

    assert_eq!(outcome.stats.triage.relevant, 0);
    assert_eq!(mock.calls(), 0);
    assert!(outcome.rows.is_empty());
}

#[tokio::test]
async fn merge_is_idempotent_over_a_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = llm_pipeline(
        ScriptedCompletion::new().then_ok(THREE_OK),
        &dir.path().join("failed.csv"),
    );

    let outcome = pipeline.run(three_comments()).await;

    assert_eq!(merge(&three_comments(), &outcome.results), outcome.rows);
    assert_eq!(
        merge(&three_comments(), &outcome.results),
        merge(&three_comments(), &outcome.results)
    );
}

#[tokio::test]
async fn dead_lettered_batches_succeed_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let failed = dir.path().join("failed.csv");
    let first = llm_pipeline(
        ScriptedCompletion::new().then_err(AiError::RateLimited { retry_after: Some(30) }),
        &failed,
    );
    first.run(three_comments()).await;

    let retry_failed = dir.path().join("failed.retry.csv");
    let second = llm_pipeline(ScriptedCompletion::new().then_ok(THREE_OK), &retry_failed);
    let outcome = second.retry(load_failed_batches(&failed).unwrap()).await;

    assert_eq!(outcome.rows.len(), 3);
    assert_eq!(outcome.rows[0].comment_id, "c1");
    assert!(load_failed_batches(&retry_failed).unwrap().is_empty());
}
