//! Record source error types.

/// Errors produced while extracting records from raw input.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("row {row}: invalid {field}: {detail}")]
    InvalidField {
        row: usize,
        field: &'static str,
        detail: String,
    },

    #[error("no valid records found in input")]
    NoRecords,
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        ParseError::Malformed(e.to_string())
    }
}
