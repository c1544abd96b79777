//! Run orchestration: triage, batch, classify under a pacer, dead-letter
//! failures, merge the rest into report rows.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use painpoint_common::config::{BatchingConfig, TriageConfig};
use painpoint_common::{
    Batch, ClassificationResult, ClassifyError, Comment, FailedBatch, FilteredComment, ReportRow,
};
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::merge;
use crate::batcher::Batcher;
use crate::classifier::BatchClassifier;
use crate::dead_letter::DeadLetterSink;
use crate::filter::{RelevanceFilter, TriageCounts};
use crate::stats::RunStats;

pub const INTERRUPTED_REASON: &str = "run interrupted before dispatch";

/// Hands out dispatch slots at least `spacing` apart, shared by every
/// in-flight batch.
struct Pacer {
    spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            next_slot: Mutex::new(None),
        }
    }

    async fn reserve(&self) -> Instant {
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.spacing);
        slot
    }
}

enum Dispatch {
    Classified(Result<Vec<ClassificationResult>, ClassifyError>),
    NotDispatched,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub rows: Vec<ReportRow>,
    pub results: Vec<ClassificationResult>,
    pub failed: Vec<FailedBatch>,
    pub stats: RunStats,
    /// No comment survived triage, so nothing was classified.
    pub empty: bool,
}

impl RunOutcome {
    fn empty(run_id: Uuid, stats: RunStats) -> Self {
        Self {
            run_id,
            rows: Vec::new(),
            results: Vec::new(),
            failed: Vec::new(),
            stats,
            empty: true,
        }
    }
}

pub struct Pipeline {
    filter: RelevanceFilter,
    batcher: Batcher,
    classifier: Arc<dyn BatchClassifier>,
    dead_letter: Arc<dyn DeadLetterSink>,
    pacer: Pacer,
    max_in_flight: usize,
    interrupt: Option<watch::Receiver<bool>>,
}

impl Pipeline {
    pub fn new(
        triage: &TriageConfig,
        batching: &BatchingConfig,
        classifier: Arc<dyn BatchClassifier>,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            filter: RelevanceFilter::new(triage),
            batcher: Batcher::new(batching.batch_size),
            classifier,
            dead_letter,
            pacer: Pacer::new(batching.inter_batch_delay()),
            max_in_flight: batching.max_in_flight.max(1),
            interrupt: None,
        }
    }

    /// Stop dispatching new batches once the flag flips to `true`.
    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn triage(&self, comments: Vec<Comment>) -> (Vec<FilteredComment>, TriageCounts) {
        self.filter.relevant(comments)
    }

    /// Full run over freshly ingested comments.
    pub async fn run(&self, comments: Vec<Comment>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let (relevant, counts) = self.triage(comments);
        let stats = RunStats {
            triage: counts,
            ..Default::default()
        };

        if relevant.is_empty() {
            info!(%run_id, total = stats.triage.total, "No comments survived triage, nothing to classify");
            return RunOutcome::empty(run_id, stats);
        }

        let ordered: Vec<Comment> = relevant.iter().map(|f| f.comment.clone()).collect();
        let batches = self.batcher.batches(relevant);
        self.classify_all(run_id, ordered, batches, stats).await
    }

    /// Re-classify batches from an earlier run's dead-letter log. The comments
    /// already passed triage, so they go straight to the classifier.
    ///
    /// The log is append-only, so the same comment can appear in several
    /// records. Each comment is sent once, and the survivors are re-batched at
    /// the current batch size.
    pub async fn retry(&self, failed: Vec<FailedBatch>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let records = failed.len();

        let mut seen = HashSet::new();
        let mut unique: Vec<FilteredComment> = Vec::new();
        for comment in failed.into_iter().flat_map(|f| f.batch.comments) {
            if seen.insert(comment.id().to_string()) {
                unique.push(comment);
            }
        }

        let count = unique.len() as u32;
        let stats = RunStats {
            triage: TriageCounts {
                total: count,
                relevant: count,
                ..Default::default()
            },
            ..Default::default()
        };

        if unique.is_empty() {
            info!(%run_id, "No failed batches to retry");
            return RunOutcome::empty(run_id, stats);
        }
        info!(%run_id, records, comments = count, "Deduplicated dead-letter records");

        let ordered: Vec<Comment> = unique.iter().map(|f| f.comment.clone()).collect();
        let batches = self.batcher.batches(unique);
        self.classify_all(run_id, ordered, batches, stats).await
    }

    async fn classify_all(
        &self,
        run_id: Uuid,
        ordered: Vec<Comment>,
        batches: Vec<Batch>,
        mut stats: RunStats,
    ) -> RunOutcome {
        stats.batches_total = batches.len() as u32;
        info!(
            %run_id,
            comments = ordered.len(),
            batches = batches.len(),
            batch_size = self.batcher.size(),
            max_in_flight = self.max_in_flight,
            "Classifying batches"
        );

        let mut results = Vec::new();
        let mut failed = Vec::new();

        let mut completed = stream::iter(batches)
            .map(|batch| self.dispatch(batch))
            .buffer_unordered(self.max_in_flight);

        while let Some((batch, dispatch)) = completed.next().await {
            match dispatch {
                Dispatch::Classified(Ok(batch_results)) => {
                    stats.batches_succeeded += 1;
                    stats.comments_classified += batch_results.len() as u32;
                    for r in &batch_results {
                        *stats.by_sentiment.entry(r.sentiment.to_string()).or_default() += 1;
                        *stats.by_pain_point.entry(r.pain_point.to_string()).or_default() += 1;
                    }
                    info!(%run_id, batch = batch.index, comments = batch.len(), "Batch classified");
                    results.extend(batch_results);
                }
                Dispatch::Classified(Err(e)) => {
                    stats.batches_failed += 1;
                    match e {
                        ClassifyError::MalformedResponse(_) => stats.malformed_responses += 1,
                        ClassifyError::Transport(_) => stats.transport_errors += 1,
                    }
                    warn!(
                        %run_id,
                        batch = batch.index,
                        comments = batch.len(),
                        kind = e.kind(),
                        error = %e,
                        "Batch failed"
                    );
                    failed.push(self.dead_letter_batch(batch, e.to_string(), &mut stats));
                }
                Dispatch::NotDispatched => {
                    stats.batches_skipped += 1;
                    failed.push(self.dead_letter_batch(batch, INTERRUPTED_REASON.to_string(), &mut stats));
                }
            }
        }
        drop(completed);

        stats.dead_letter_write_failures = self.dead_letter.write_failures();
        stats.interrupted = self.interrupted();

        let rows = merge(&ordered, &results);
        info!(
            %run_id,
            rows = rows.len(),
            failed_batches = failed.len(),
            "Run finished"
        );

        RunOutcome {
            run_id,
            rows,
            results,
            failed,
            stats,
            empty: false,
        }
    }

    async fn dispatch(&self, batch: Batch) -> (Batch, Dispatch) {
        if self.interrupted() {
            return (batch, Dispatch::NotDispatched);
        }
        let slot = self.pacer.reserve().await;
        if !self.wait_for_slot(slot).await {
            return (batch, Dispatch::NotDispatched);
        }

        let outcome = self
            .classifier
            .classify(&batch)
            .await
            .and_then(|results| check_coverage(&batch, results));
        (batch, Dispatch::Classified(outcome))
    }

    /// Sleep until `slot`. Returns false if the run was interrupted meanwhile.
    async fn wait_for_slot(&self, slot: Instant) -> bool {
        let Some(mut interrupt) = self.interrupt.clone() else {
            tokio::time::sleep_until(slot).await;
            return true;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(slot) => {}
            _ = interrupt_raised(&mut interrupt) => return false,
        }
        let stopped = *interrupt.borrow();
        !stopped
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|rx| *rx.borrow())
    }

    fn dead_letter_batch(&self, batch: Batch, reason: String, stats: &mut RunStats) -> FailedBatch {
        stats.comments_failed += batch.len() as u32;
        let failed = FailedBatch::new(batch, reason);
        self.dead_letter.record(&failed);
        failed
    }
}

async fn interrupt_raised(rx: &mut watch::Receiver<bool>) {
    let sender_gone = rx.wait_for(|stop| *stop).await.is_err();
    if sender_gone {
        std::future::pending::<()>().await;
    }
}

/// A classifier must answer every comment of the batch, in order.
fn check_coverage(
    batch: &Batch,
    results: Vec<ClassificationResult>,
) -> Result<Vec<ClassificationResult>, ClassifyError> {
    if results.len() != batch.len() {
        return Err(ClassifyError::MalformedResponse(format!(
            "expected {} classifications, got {}",
            batch.len(),
            results.len()
        )));
    }
    if let Some((r, c)) = results
        .iter()
        .zip(&batch.comments)
        .find(|(r, c)| r.comment_id != c.id())
    {
        return Err(ClassifyError::MalformedResponse(format!(
            "result for '{}' where '{}' was expected",
            r.comment_id,
            c.id()
        )));
    }
    Ok(results)
}
