//! Transfer error types.

use std::fmt;

use serde::{Deserialize, Serialize};

use bulkload_records::ParseError;

/// Errors that stop a batch, or flag a bookkeeping bug, at the batch level.
///
/// Per-chunk transfer failures are not batch errors: they travel as
/// [`TransportError`] values inside chunk outcomes.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("no records to upload")]
    EmptyInput,

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("inconsistent outcome for chunk {chunk_index}: {detail}")]
    AggregationConsistency { chunk_index: usize, detail: String },
}

/// Transport-level classification of a failed chunk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connection refused, reset, DNS failure, TLS failure.
    Network,
    /// 5xx or an acknowledgement that could not be read.
    Server,
    /// 4xx or an explicit `success: false` from the endpoint.
    Rejected,
    /// No answer within the request timeout.
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Network => "network",
            FailureKind::Server => "server",
            FailureKind::Rejected => "rejected",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// A classified chunk transfer failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Server, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Rejected, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }
}
