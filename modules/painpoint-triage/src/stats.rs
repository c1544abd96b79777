use std::collections::BTreeMap;

use crate::filter::TriageCounts;

/// Stats from a triage run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub triage: TriageCounts,
    pub batches_total: u32,
    pub batches_succeeded: u32,
    pub batches_failed: u32,
    pub batches_skipped: u32,
    pub comments_classified: u32,
    pub comments_failed: u32,
    pub malformed_responses: u32,
    pub transport_errors: u32,
    pub dead_letter_write_failures: u32,
    pub by_sentiment: BTreeMap<String, u32>,
    pub by_pain_point: BTreeMap<String, u32>,
    pub interrupted: bool,
}

impl RunStats {
    /// Every relevant comment is either classified or sitting in a failed batch.
    pub fn is_accounted(&self) -> bool {
        self.comments_classified + self.comments_failed == self.triage.relevant
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Triage Run Complete ===")?;
        writeln!(f, "Comments read:      {}", self.triage.total)?;
        writeln!(f, "Relevant:           {}", self.triage.relevant)?;
        writeln!(f, "\nFiltered out:")?;
        writeln!(f, "  Empty:            {}", self.triage.empty)?;
        writeln!(f, "  Placeholder:      {}", self.triage.placeholder)?;
        writeln!(f, "  Excluded author:  {}", self.triage.excluded_author)?;
        writeln!(f, "  Too long:         {}", self.triage.too_long)?;
        writeln!(f, "  No keyword:       {}", self.triage.no_keyword)?;
        writeln!(f, "\nBatches:            {}", self.batches_total)?;
        writeln!(f, "  Succeeded:        {}", self.batches_succeeded)?;
        writeln!(f, "  Failed:           {}", self.batches_failed)?;
        if self.batches_skipped > 0 {
            writeln!(f, "  Not dispatched:   {}", self.batches_skipped)?;
        }
        writeln!(f, "  Malformed:        {}", self.malformed_responses)?;
        writeln!(f, "  Transport:        {}", self.transport_errors)?;
        writeln!(f, "\nComments classified:{}", self.comments_classified)?;
        writeln!(f, "Comments failed:    {}", self.comments_failed)?;

        let total = self.comments_classified.max(1);
        if !self.by_sentiment.is_empty() {
            writeln!(f, "\nBy sentiment:")?;
            for (label, count) in &self.by_sentiment {
                writeln!(
                    f,
                    "  {label:<10} {count} ({:.0}%)",
                    *count as f64 / total as f64 * 100.0
                )?;
            }
        }
        if !self.by_pain_point.is_empty() {
            writeln!(f, "\nBy pain point:")?;
            for (label, count) in &self.by_pain_point {
                writeln!(f, "  {label:<24} {count}")?;
            }
        }
        if self.dead_letter_write_failures > 0 {
            writeln!(
                f,
                "\nWARNING: {} failed batch(es) could not be written to the dead-letter file",
                self.dead_letter_write_failures
            )?;
        }
        if self.interrupted {
            writeln!(f, "\nRun was interrupted.")?;
        }
        Ok(())
    }
}
