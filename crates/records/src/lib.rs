//! Record sources for bulk uploads.
//!
//! A record source turns raw input bytes into an ordered sequence of
//! normalized [`Record`]s. Amount and date normalization happens here so
//! the transfer core never has to look inside a record.

pub mod error;
pub mod normalize;
pub mod sheet;

pub use bulkload_protocol::Record;
pub use error::ParseError;
pub use sheet::SheetRowSource;

/// Produces ordered records from raw input.
pub trait RecordSource: Send + Sync {
    /// Parses `raw` into records, preserving row order.
    ///
    /// Fails with [`ParseError::NoRecords`] when nothing could be extracted.
    fn parse(&self, raw: &[u8]) -> Result<Vec<Record>, ParseError>;
}
