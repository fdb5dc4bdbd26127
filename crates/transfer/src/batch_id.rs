//! Batch identifiers.
//!
//! Format: `batch_<unix-millis>_<sequence>_<random>`. The per-process
//! sequence makes identifiers unique within one process even when two
//! batches start in the same millisecond; the timestamp and random
//! suffix make cross-process collisions improbable.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of the random suffix.
const SUFFIX_LEN: usize = 7;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a new batch identifier.
pub fn new_batch_id() -> String {
    let stamp = Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("batch_{stamp}_{seq}_{suffix}")
}
