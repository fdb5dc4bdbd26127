//! Splits an ordered record sequence into fixed-size chunks.

use bulkload_protocol::Record;

use crate::batch_id::new_batch_id;
use crate::error::BatchError;
use crate::types::{Batch, Chunk};

/// Partitions `records` into chunks of `chunk_size` under a fresh batch id.
///
/// Every chunk holds `chunk_size` records except possibly the last. Order
/// is preserved within and across chunks. Input is validated before a
/// batch identifier is generated.
pub fn partition(records: Vec<Record>, chunk_size: usize) -> Result<Batch, BatchError> {
    if chunk_size == 0 {
        return Err(BatchError::InvalidConfiguration(
            "chunk size must be at least 1".into(),
        ));
    }
    if records.is_empty() {
        return Err(BatchError::EmptyInput);
    }
    Ok(partition_with_id(new_batch_id(), records, chunk_size))
}

/// Partitions under a caller-supplied batch id. `chunk_size` must be >= 1.
fn partition_with_id(batch_id: String, records: Vec<Record>, chunk_size: usize) -> Batch {
    let total_chunks = records.len().div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(total_chunks);
    let mut remaining = records.into_iter().peekable();

    while remaining.peek().is_some() {
        let records: Vec<Record> = remaining.by_ref().take(chunk_size).collect();
        chunks.push(Chunk {
            batch_id: batch_id.clone(),
            index: chunks.len(),
            total_chunks,
            records,
        });
    }

    Batch { batch_id, chunks }
}
