//! Row-object spreadsheet source.
//!
//! Accepts the JSON produced by exporting the first sheet of a workbook
//! as an array of objects keyed by column header, e.g.
//! `[{"TenantId":"acme","Name":"Ada","Amount":"12.50","Date":45292}]`.

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use bulkload_protocol::{DEFAULT_TENANT, Record};

use crate::error::ParseError;
use crate::normalize;
use crate::RecordSource;

/// Parses row-object sheet exports into [`Record`]s.
#[derive(Debug, Clone, Default)]
pub struct SheetRowSource {
    today: Option<NaiveDate>,
}

impl SheetRowSource {
    /// Creates a source that falls back to the current UTC date for
    /// missing or unreadable date cells.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the fallback date (used by tests and replays).
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }
}

impl RecordSource for SheetRowSource {
    fn parse(&self, raw: &[u8]) -> Result<Vec<Record>, ParseError> {
        let value: Value = serde_json::from_slice(raw)?;
        let Value::Array(rows) = value else {
            return Err(ParseError::Malformed(
                "expected an array of row objects".into(),
            ));
        };

        let today = self.today();
        let stamp = Utc::now().timestamp_millis();
        let mut records = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            let Value::Object(row) = row else {
                return Err(ParseError::Malformed(format!(
                    "row {index} is not an object"
                )));
            };

            let tenant_id = match normalize::column(row, &["TenantId", "tenantId"]) {
                Some(v) => normalize::cell_text(Some(v)),
                None => DEFAULT_TENANT.to_string(),
            };
            let amount = normalize::amount(normalize::column(row, &["Amount", "amount"]))
                .map_err(|detail| ParseError::InvalidField {
                    row: index,
                    field: "amount",
                    detail,
                })?;

            records.push(Record {
                id: format!("rec_{stamp}_{index}"),
                tenant_id,
                name: normalize::cell_text(normalize::column(row, &["Name", "name"])),
                email: normalize::cell_text(normalize::column(row, &["Email", "email"])),
                amount,
                date: normalize::date(normalize::column(row, &["Date", "date"]), today),
            });
        }

        if records.is_empty() {
            return Err(ParseError::NoRecords);
        }

        debug!(records = records.len(), "parsed sheet rows");
        Ok(records)
    }
}
