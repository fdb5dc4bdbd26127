//! Progress and error aggregation.
//!
//! The [`Aggregator`] is the only writer of [`BatchProgress`]. Mutations
//! happen under one mutex, and each one publishes a fresh snapshot on a
//! watch channel so readers never see a half-applied update.

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{error, info};

use crate::error::BatchError;
use crate::types::{Batch, BatchProgress, BatchStatus, ChunkError, ChunkOutcome, ChunkStatus};

/// Owns the progress state of one batch at a time.
pub struct Aggregator {
    inner: Mutex<AggregatorInner>,
    watch_tx: watch::Sender<BatchProgress>,
}

#[derive(Default)]
struct AggregatorInner {
    progress: BatchProgress,
    /// `true` once a chunk has a terminal outcome, indexed by chunk.
    terminal: Vec<bool>,
    /// Latest `(transferred, total)` bytes per chunk.
    chunk_bytes: Vec<(u64, u64)>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Creates an aggregator in the `Idle` state.
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(BatchProgress::default());
        Self {
            inner: Mutex::new(AggregatorInner::default()),
            watch_tx,
        }
    }

    /// Returns a receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.watch_tx.subscribe()
    }

    /// Returns the current progress snapshot.
    pub fn snapshot(&self) -> BatchProgress {
        self.inner.lock().unwrap().progress.clone()
    }

    /// Returns the chunk failures recorded so far, in arrival order.
    pub fn errors(&self) -> Vec<ChunkError> {
        self.inner.lock().unwrap().progress.errors.clone()
    }

    /// Resets to `Idle` with zeroed counters.
    pub fn reset(&self) {
        self.update(|inner| *inner = AggregatorInner::default());
    }

    /// Resets and enters `Processing` (input is being read).
    pub fn begin_processing(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|inner| {
            *inner = AggregatorInner::default();
            inner.progress.status = BatchStatus::Processing;
            inner.progress.message = message;
        });
    }

    /// Records the partitioned batch. Status moves to `Uploading` on the
    /// first admission, not here.
    pub fn prepare(&self, batch: &Batch) {
        let total = batch.total_chunks();
        let message = format!(
            "Uploading {} records in {} chunks...",
            batch.record_count(),
            total
        );
        self.update(|inner| {
            inner.terminal = vec![false; total];
            inner.chunk_bytes = vec![(0, 0); total];
            inner.progress.batch_id = batch.batch_id.clone();
            inner.progress.total_chunks = total;
            inner.progress.message = message;
        });
    }

    /// A chunk was handed to a transfer worker.
    pub fn on_admitted(&self, chunk_index: usize) {
        self.update(|inner| {
            if inner.progress.status == BatchStatus::Processing
                && chunk_index < inner.progress.total_chunks
            {
                inner.progress.status = BatchStatus::Uploading;
            }
        });
    }

    /// Updates transient byte counters. Counters of chunks that are
    /// already terminal are left alone.
    pub fn on_progress(&self, chunk_index: usize, bytes_transferred: u64, bytes_total: u64) {
        self.update(|inner| {
            if chunk_index >= inner.chunk_bytes.len() || inner.terminal[chunk_index] {
                return;
            }
            inner.chunk_bytes[chunk_index] = (bytes_transferred, bytes_total);
            inner.recompute_bytes();
        });
    }

    /// Applies a terminal chunk outcome.
    ///
    /// A second terminal outcome for the same chunk, or one for a chunk
    /// that does not exist, is rejected without touching any counter.
    pub fn on_outcome(&self, outcome: ChunkOutcome) -> Result<(), BatchError> {
        let index = outcome.chunk_index;
        let mut inner = self.inner.lock().unwrap();

        if index >= inner.terminal.len() {
            let detail = format!(
                "chunk index out of range (batch has {} chunks)",
                inner.terminal.len()
            );
            error!(chunk = index, %detail, "rejected outcome");
            return Err(BatchError::AggregationConsistency {
                chunk_index: index,
                detail,
            });
        }
        if inner.terminal[index] {
            let detail = "duplicate terminal outcome".to_string();
            error!(chunk = index, %detail, "rejected outcome");
            return Err(BatchError::AggregationConsistency {
                chunk_index: index,
                detail,
            });
        }

        inner.terminal[index] = true;
        if let (Some(sent), Some(total)) = (outcome.bytes_transferred, outcome.bytes_total) {
            inner.chunk_bytes[index] = (sent, total);
        }

        match outcome.status {
            ChunkStatus::Success => inner.progress.completed_chunks += 1,
            ChunkStatus::Failed(e) => {
                inner.progress.failed_chunks += 1;
                inner.progress.errors.push(ChunkError {
                    chunk_index: index,
                    kind: e.kind,
                    message: e.message,
                });
            }
        }

        inner.recompute_bytes();
        inner.progress.percentage = percentage(
            inner.progress.completed_chunks,
            inner.progress.total_chunks,
        );
        if inner.progress.pending_chunks() == 0 {
            inner.settle();
        }

        self.watch_tx.send_replace(inner.progress.clone());
        Ok(())
    }

    /// Ends the batch with a fatal error raised before dispatch.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|inner| {
            inner.progress.status = BatchStatus::Error;
            inner.progress.message = message;
        });
    }

    /// Called once the dispatcher's event stream has closed.
    ///
    /// If some chunks never reached a terminal outcome the batch ends as
    /// `Cancelled` when cancellation was requested, otherwise as `Error`.
    pub fn finish(&self, cancelled: bool) {
        self.update(|inner| {
            if inner.progress.status.is_terminal() {
                return;
            }
            let p = &mut inner.progress;
            let unfinished = p.pending_chunks();
            if cancelled {
                p.status = BatchStatus::Cancelled;
                p.message = format!(
                    "Cancelled: {} of {} chunks uploaded, {} failed, {} not sent.",
                    p.completed_chunks, p.total_chunks, p.failed_chunks, unfinished
                );
            } else {
                error!(unfinished, "dispatch ended before every chunk reported");
                p.status = BatchStatus::Error;
                p.message = format!("Upload ended with {unfinished} chunks unaccounted for.");
            }
        });
    }

    fn update(&self, f: impl FnOnce(&mut AggregatorInner)) {
        let mut inner = self.inner.lock().unwrap();
        f(&mut inner);
        self.watch_tx.send_replace(inner.progress.clone());
    }
}

impl AggregatorInner {
    fn recompute_bytes(&mut self) {
        let (sent, total) = self
            .chunk_bytes
            .iter()
            .fold((0u64, 0u64), |(s, t), (cs, ct)| (s + cs, t + ct));
        self.progress.bytes_transferred = sent;
        self.progress.bytes_total = total;
    }

    /// Moves a fully reported batch to its final status.
    fn settle(&mut self) {
        let p = &mut self.progress;
        if p.failed_chunks == 0 {
            p.status = BatchStatus::Completed;
            p.message = format!("Successfully uploaded all {} chunks!", p.total_chunks);
        } else {
            p.status = BatchStatus::Error;
            p.message = format!(
                "Completed with {} failed chunks. Please retry.",
                p.failed_chunks
            );
        }
        info!(
            batch_id = %p.batch_id,
            completed = p.completed_chunks,
            failed = p.failed_chunks,
            status = ?p.status,
            "batch finished"
        );
    }
}

/// Successful chunks as a percentage of `total`, rounded to one decimal.
fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 * 1000.0 / total as f64).round() / 10.0
}
