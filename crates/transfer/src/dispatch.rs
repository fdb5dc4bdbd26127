//! Concurrency-bounded dispatcher.
//!
//! A fixed pool of `min(max_concurrency, total_chunks)` tasks pulls chunk
//! indices from a shared atomic cursor, so admission follows index order
//! and a finished transfer is replaced by the next queued chunk. All
//! events funnel into one channel; it closes once every pool task has
//! exited, which only happens after each admitted chunk has produced its
//! terminal outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{BatchError, TransportError};
use crate::types::{Batch, ChunkOutcome};
use crate::worker::TransferWorker;

/// Capacity of the dispatcher's event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event emitted by the dispatcher while a batch is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// A chunk was handed to a transfer worker.
    Admitted { chunk_index: usize },
    /// Transient byte-level progress for an in-flight chunk.
    Progress {
        chunk_index: usize,
        bytes_transferred: u64,
        bytes_total: u64,
    },
    /// A chunk reached its terminal outcome.
    Finished(ChunkOutcome),
}

/// Schedules chunk transfers under a concurrency bound.
pub struct Dispatcher {
    worker: Arc<TransferWorker>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(worker: TransferWorker, cancel: CancellationToken) -> Self {
        Self {
            worker: Arc::new(worker),
            cancel,
        }
    }

    /// Returns the token that stops further admissions.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Starts transferring every chunk of `batch`.
    ///
    /// Must be called from within a tokio runtime. The returned receiver
    /// yields one [`DispatchEvent::Finished`] per admitted chunk in
    /// completion order and closes when the pool has drained. After
    /// cancellation no new chunk is admitted, but in-flight transfers run
    /// to completion and still report.
    pub fn run(
        &self,
        batch: Arc<Batch>,
        max_concurrency: usize,
    ) -> Result<mpsc::Receiver<DispatchEvent>, BatchError> {
        if max_concurrency == 0 {
            return Err(BatchError::InvalidConfiguration(
                "max concurrency must be at least 1".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let total = batch.total_chunks();
        let pool_size = max_concurrency.min(total);
        let cursor = Arc::new(AtomicUsize::new(0));

        info!(
            batch_id = %batch.batch_id,
            chunks = total,
            workers = pool_size,
            "dispatching batch"
        );

        for slot in 0..pool_size {
            tokio::spawn(pool_task(
                slot,
                Arc::clone(&batch),
                Arc::clone(&cursor),
                Arc::clone(&self.worker),
                self.cancel.clone(),
                tx.clone(),
            ));
        }

        Ok(rx)
    }
}

/// One pool slot: admit, transfer, report, repeat.
async fn pool_task(
    slot: usize,
    batch: Arc<Batch>,
    cursor: Arc<AtomicUsize>,
    worker: Arc<TransferWorker>,
    cancel: CancellationToken,
    tx: mpsc::Sender<DispatchEvent>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(slot, "cancelled, admitting no further chunks");
            break;
        }

        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= batch.total_chunks() {
            break;
        }

        if tx
            .send(DispatchEvent::Admitted { chunk_index: index })
            .await
            .is_err()
        {
            debug!(slot, "event receiver dropped, stopping");
            break;
        }

        let outcome = transfer(index, &batch, &worker, &tx).await;

        if tx.send(DispatchEvent::Finished(outcome)).await.is_err() {
            debug!(slot, chunk = index, "event receiver dropped, stopping");
            break;
        }
    }
}

/// Runs one chunk transfer on its own task so that a panicking transport
/// still yields a terminal outcome.
async fn transfer(
    index: usize,
    batch: &Arc<Batch>,
    worker: &Arc<TransferWorker>,
    tx: &mpsc::Sender<DispatchEvent>,
) -> ChunkOutcome {
    let task = tokio::spawn({
        let batch = Arc::clone(batch);
        let worker = Arc::clone(worker);
        let tx = tx.clone();
        async move {
            let on_progress = move |bytes_transferred: u64, bytes_total: u64| {
                // Progress is transient; drop it rather than stall the transfer.
                let _ = tx.try_send(DispatchEvent::Progress {
                    chunk_index: index,
                    bytes_transferred,
                    bytes_total,
                });
            };
            worker.send(&batch.chunks[index], &on_progress).await
        }
    });

    match task.await {
        Ok(outcome) => outcome,
        Err(e) => ChunkOutcome::failed(
            index,
            TransportError::network(format!("transfer task aborted: {e}")),
        ),
    }
}
