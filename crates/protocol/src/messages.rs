use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_TENANT, Record};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// One chunk of a batch as posted to the bulk-upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    pub batch_id: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub tenant_id: String,
    pub records: Vec<Record>,
}

impl ChunkPayload {
    /// Builds a payload, taking the tenant from the first record.
    pub fn new(
        batch_id: impl Into<String>,
        chunk_index: usize,
        total_chunks: usize,
        records: Vec<Record>,
    ) -> Self {
        let tenant_id = records
            .first()
            .map(|r| r.tenant_id.clone())
            .unwrap_or_else(|| DEFAULT_TENANT.to_string());
        Self {
            batch_id: batch_id.into(),
            chunk_index,
            total_chunks,
            tenant_id,
            records,
        }
    }
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Acknowledgement returned by the endpoint for an accepted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub chunk_index: usize,
}

/// Best-effort shape of an error body.
///
/// Endpoints disagree on where the human-readable text lives, so every
/// field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ApiErrorBody {
    /// Returns the first non-empty human-readable message.
    pub fn best_message(&self) -> Option<&str> {
        [&self.message, &self.error, &self.title]
            .into_iter()
            .filter_map(|m| m.as_deref())
            .find(|m| !m.trim().is_empty())
    }
}
