use std::time::Duration;

use serde::{Deserialize, Serialize};

use bulkload_protocol::{ChunkPayload, Record};

use crate::error::{BatchError, FailureKind, TransportError};
use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENCY, DEFAULT_REQUEST_TIMEOUT};

/// A contiguous, ordered slice of a batch's records; the unit of transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Identifier shared by every chunk of the batch.
    pub batch_id: String,
    /// Zero-based position, assigned at partition time.
    pub index: usize,
    /// Number of chunks in the batch.
    pub total_chunks: usize,
    pub records: Vec<Record>,
}

impl Chunk {
    /// Number of records in this chunk.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Builds the wire payload for this chunk.
    pub fn to_payload(&self) -> ChunkPayload {
        ChunkPayload::new(
            self.batch_id.clone(),
            self.index,
            self.total_chunks,
            self.records.clone(),
        )
    }
}

/// Every chunk of one upload. Immutable once partitioned.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub chunks: Vec<Chunk>,
}

impl Batch {
    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Total number of records across all chunks.
    pub fn record_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

/// Terminal state of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    Success,
    Failed(TransportError),
}

/// Result of transferring one chunk. Produced exactly once per chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunk_index: usize,
    pub status: ChunkStatus,
    pub bytes_transferred: Option<u64>,
    pub bytes_total: Option<u64>,
}

impl ChunkOutcome {
    pub fn success(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            status: ChunkStatus::Success,
            bytes_transferred: None,
            bytes_total: None,
        }
    }

    pub fn failed(chunk_index: usize, error: TransportError) -> Self {
        Self {
            chunk_index,
            status: ChunkStatus::Failed(error),
            bytes_transferred: None,
            bytes_total: None,
        }
    }

    /// Attaches byte counters reported by the transport.
    pub fn with_bytes(mut self, transferred: u64, total: u64) -> Self {
        self.bytes_transferred = Some(transferred);
        self.bytes_total = Some(total);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ChunkStatus::Success)
    }
}

/// Lifecycle of a batch as seen by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    #[default]
    Idle,
    Processing,
    Uploading,
    Completed,
    Error,
    Cancelled,
}

impl BatchStatus {
    /// Returns `true` once the batch can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Error | BatchStatus::Cancelled
        )
    }
}

/// A failed chunk, kept for inspection and retry tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkError {
    pub chunk_index: usize,
    pub kind: FailureKind,
    pub message: String,
}

/// Snapshot of a batch's progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub batch_id: String,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    /// Successful chunks as a percentage of all chunks, one decimal.
    pub percentage: f64,
    pub status: BatchStatus,
    pub message: String,
    /// Failures in arrival order.
    pub errors: Vec<ChunkError>,
    pub bytes_transferred: u64,
    pub bytes_total: u64,
}

impl BatchProgress {
    /// Chunks that have reached a terminal outcome.
    pub fn finished_chunks(&self) -> usize {
        self.completed_chunks + self.failed_chunks
    }

    /// Chunks still waiting for a terminal outcome.
    pub fn pending_chunks(&self) -> usize {
        self.total_chunks.saturating_sub(self.finished_chunks())
    }
}

/// Tunables for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// Records per chunk.
    pub chunk_size: usize,
    /// Maximum simultaneously in-flight chunk transfers.
    pub max_concurrency: usize,
    /// Upper bound on a single chunk transfer.
    pub request_timeout: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl UploadOptions {
    /// Rejects settings that would make a batch impossible to run.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.chunk_size == 0 {
            return Err(BatchError::InvalidConfiguration(
                "chunk size must be at least 1".into(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(BatchError::InvalidConfiguration(
                "max concurrency must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(BatchError::InvalidConfiguration(
                "request timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}
