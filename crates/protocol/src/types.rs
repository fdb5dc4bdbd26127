use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Tenant assigned to rows and chunks that carry no tenant of their own.
pub const DEFAULT_TENANT: &str = "default-tenant";

/// A single normalized row ready for upload.
///
/// Records are immutable once produced by a record source; the transfer
/// core only groups and forwards them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub amount: f64,
    /// Calendar date, serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
}
