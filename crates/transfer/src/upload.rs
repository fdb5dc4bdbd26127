//! Batch entry point: parse, partition, dispatch, aggregate.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use bulkload_records::RecordSource;

use crate::aggregate::Aggregator;
use crate::dispatch::{DispatchEvent, Dispatcher};
use crate::error::BatchError;
use crate::partition::partition;
use crate::transport::Transport;
use crate::types::{BatchProgress, ChunkError, UploadOptions};
use crate::worker::TransferWorker;

/// Starts batches against one record source and one transport.
pub struct BatchUploader {
    source: Arc<dyn RecordSource>,
    transport: Arc<dyn Transport>,
}

impl BatchUploader {
    pub fn new(source: Arc<dyn RecordSource>, transport: Arc<dyn Transport>) -> Self {
        Self { source, transport }
    }

    /// Parses `raw`, partitions the records and starts transferring them.
    ///
    /// Must be called from within a tokio runtime. Invalid `options` are
    /// returned as an error before any work starts. Input that cannot be
    /// parsed, or holds no records, yields a handle that has already
    /// finished in `Error`.
    pub fn start_batch(
        &self,
        raw: &[u8],
        options: &UploadOptions,
    ) -> Result<BatchHandle, BatchError> {
        options.validate()?;

        let aggregator = Arc::new(Aggregator::new());
        let cancel = CancellationToken::new();
        aggregator.begin_processing("Processing file...");

        let records = match self.source.parse(raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "input rejected");
                aggregator.fail(format!("Error: {e}"));
                return Ok(BatchHandle::new(String::new(), aggregator, cancel));
            }
        };

        let batch = match partition(records, options.chunk_size) {
            Ok(batch) => batch,
            Err(BatchError::EmptyInput) => {
                aggregator.fail("Error: no records to upload");
                return Ok(BatchHandle::new(String::new(), aggregator, cancel));
            }
            Err(e) => return Err(e),
        };

        info!(
            batch_id = %batch.batch_id,
            records = batch.record_count(),
            chunks = batch.total_chunks(),
            "batch prepared"
        );
        aggregator.prepare(&batch);
        let batch_id = batch.batch_id.clone();

        let worker = TransferWorker::new(Arc::clone(&self.transport), options.request_timeout);
        let dispatcher = Dispatcher::new(worker, cancel.clone());
        let events = dispatcher.run(Arc::new(batch), options.max_concurrency)?;

        tokio::spawn(drive(events, Arc::clone(&aggregator), cancel.clone()));

        Ok(BatchHandle::new(batch_id, aggregator, cancel))
    }
}

/// Feeds dispatcher events into the aggregator until the pool drains.
async fn drive(
    mut events: mpsc::Receiver<DispatchEvent>,
    aggregator: Arc<Aggregator>,
    cancel: CancellationToken,
) {
    while let Some(event) = events.recv().await {
        match event {
            DispatchEvent::Admitted { chunk_index } => aggregator.on_admitted(chunk_index),
            DispatchEvent::Progress {
                chunk_index,
                bytes_transferred,
                bytes_total,
            } => aggregator.on_progress(chunk_index, bytes_transferred, bytes_total),
            DispatchEvent::Finished(outcome) => {
                // Rejections are logged by the aggregator.
                let _ = aggregator.on_outcome(outcome);
            }
        }
    }
    aggregator.finish(cancel.is_cancelled());
}

/// Read-only view of a running batch plus its cancel control.
///
/// Cheap to clone; every clone observes the same batch.
#[derive(Clone)]
pub struct BatchHandle {
    batch_id: String,
    aggregator: Arc<Aggregator>,
    cancel: CancellationToken,
}

impl BatchHandle {
    fn new(batch_id: String, aggregator: Arc<Aggregator>, cancel: CancellationToken) -> Self {
        Self {
            batch_id,
            aggregator,
            cancel,
        }
    }

    /// Batch identifier; empty when the input never produced a batch.
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> BatchProgress {
        self.aggregator.snapshot()
    }

    /// Chunk failures so far, in arrival order.
    pub fn errors(&self) -> Vec<ChunkError> {
        self.aggregator.errors()
    }

    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.aggregator.subscribe()
    }

    /// Stops admitting chunks. In-flight transfers still finish and are
    /// counted.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            info!(batch_id = %self.batch_id, "cancellation requested");
            self.cancel.cancel();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress().status.is_terminal()
    }

    /// Waits for the batch to reach a terminal status and returns the final
    /// snapshot.
    pub async fn wait(&self) -> BatchProgress {
        let mut rx = self.subscribe();
        let done = match rx.wait_for(|p| p.status.is_terminal()).await {
            Ok(progress) => progress.clone(),
            Err(_) => self.progress(),
        };
        done
    }
}
