// src/engine/queue.rs

use std::collections::BTreeSet;

use tracing::debug;

/// Paths that arrive while a batch is being decided or built.
///
/// Every arriving batch is merged into one pending set, so however many
/// batches pile up during a long build, exactly one follow-up decision runs.
#[derive(Debug, Default)]
pub struct BatchQueue {
    paths: BTreeSet<String>,
    batches: usize,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Merge another batch into the pending set.
    pub fn push(&mut self, paths: impl IntoIterator<Item = String>) {
        let before = self.paths.len();
        self.paths.extend(paths);
        self.batches += 1;
        debug!(
            new_paths = self.paths.len() - before,
            batches = self.batches,
            "queued batch while busy"
        );
    }

    /// Take everything queued so far as one batch.
    pub fn drain(&mut self) -> Vec<String> {
        if self.batches > 1 {
            debug!(batches = self.batches, paths = self.paths.len(), "coalesced queued batches");
        }
        self.batches = 0;
        std::mem::take(&mut self.paths).into_iter().collect()
    }
}
