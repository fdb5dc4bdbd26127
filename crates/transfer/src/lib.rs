//! Chunked bulk-record transfer.
//!
//! Records are partitioned into fixed-size chunks under one batch id, sent
//! through a [`Transport`] by a concurrency-bounded [`Dispatcher`], and
//! folded into a single [`BatchProgress`] by the [`Aggregator`].
//! [`BatchUploader`] wires the pieces together.

use std::time::Duration;

mod aggregate;
mod batch_id;
mod dispatch;
mod error;
mod http;
mod partition;
mod progress;
mod transport;
mod types;
mod upload;
mod worker;

pub use aggregate::Aggregator;
pub use batch_id::new_batch_id;
pub use dispatch::{DispatchEvent, Dispatcher};
pub use error::{BatchError, FailureKind, TransportError};
pub use http::{
    BATCH_ID_HEADER, CHECKSUM_HEADER, CHUNK_INDEX_HEADER, HttpTransport, checksum_bytes,
};
pub use partition::partition;
pub use progress::{ProgressReport, ProgressReporter, ReportCallback, SpeedCalculator};
pub use transport::{ByteProgress, Delivery, Transport};
pub use types::{
    Batch, BatchProgress, BatchStatus, Chunk, ChunkError, ChunkOutcome, ChunkStatus,
    UploadOptions,
};
pub use upload::{BatchHandle, BatchUploader};
pub use worker::TransferWorker;

/// Default records per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 200;

/// Default number of simultaneously in-flight chunk transfers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Default upper bound on a single chunk transfer.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
