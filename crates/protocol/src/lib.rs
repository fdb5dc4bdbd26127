//! Wire types shared between the record source, the transfer core and
//! the bulk-upload endpoint.

pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{ApiErrorBody, ApiResponse, ChunkPayload};
pub use types::{DEFAULT_TENANT, Record};
