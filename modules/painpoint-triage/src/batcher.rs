use painpoint_common::{Batch, FilteredComment};

/// Splits relevant comments into fixed-size batches. Deterministic: the same
/// input and size always produce the same boundaries.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    size: usize,
}

impl Batcher {
    /// `size` is clamped to at least 1; config validation rejects 0 earlier.
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.size)
    }

    pub fn batches(&self, comments: Vec<FilteredComment>) -> Vec<Batch> {
        let mut batches = Vec::with_capacity(self.batch_count(comments.len()));
        let mut iter = comments.into_iter().peekable();

        while iter.peek().is_some() {
            let chunk: Vec<FilteredComment> = iter.by_ref().take(self.size).collect();
            batches.push(Batch {
                index: batches.len(),
                comments: chunk,
            });
        }

        batches
    }
}
