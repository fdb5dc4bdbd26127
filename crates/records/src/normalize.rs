//! Cell normalization: amounts, dates and free-text cells.
//!
//! Spreadsheet exports hand us loosely typed JSON values. These helpers
//! convert them into the canonical types carried by [`Record`].
//!
//! [`Record`]: bulkload_protocol::Record

use chrono::{DateTime, Days, NaiveDate};
use serde_json::{Map, Value};

/// Date formats tried, in order, for string cells.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];

/// Returns the first column in `keys` holding a non-empty value.
///
/// Null cells and blank strings count as absent so that `Amount` falls
/// through to `amount` the same way an empty spreadsheet cell would.
pub fn column<'a>(row: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| row.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    })
}

/// Renders a cell as text. Numbers and booleans are stringified.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Converts an amount cell to `f64`.
///
/// Missing cells are `0.0`. Strings may carry thousands separators.
pub fn amount(value: Option<&Value>) -> Result<f64, String> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("number out of range: {n}"))?,
        Some(Value::String(s)) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            if cleaned.is_empty() {
                return Ok(0.0);
            }
            cleaned
                .parse::<f64>()
                .map_err(|_| format!("not a number: {s:?}"))?
        }
        Some(other) => return Err(format!("unsupported cell value: {other}")),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(format!("not a finite number: {parsed}"))
    }
}

/// Converts an Excel serial day number to a calendar date.
///
/// Serial 25569 is 1970-01-01; the fractional (time-of-day) part is dropped.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parses a date string in any of the accepted formats.
pub fn parse_date_str(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Converts a date cell, falling back to `today` when it is missing or
/// cannot be interpreted.
pub fn date(value: Option<&Value>, today: NaiveDate) -> NaiveDate {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(excel_serial_to_date),
        Some(Value::String(s)) => parse_date_str(s),
        _ => None,
    };
    parsed.unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn column_skips_blank_and_null() {
        let row = json!({"Amount": "", "amount": 5, "Name": null, "name": "x"});
        let row = row.as_object().unwrap();
        assert_eq!(column(row, &["Amount", "amount"]), Some(&json!(5)));
        assert_eq!(column(row, &["Name", "name"]), Some(&json!("x")));
        assert_eq!(column(row, &["Email", "email"]), None);
    }

    #[test]
    fn cell_text_stringifies_numbers() {
        assert_eq!(cell_text(Some(&json!(42))), "42");
        assert_eq!(cell_text(Some(&json!("  Ada "))), "Ada");
        assert_eq!(cell_text(None), "");
    }

    #[test]
    fn amount_accepts_numbers_and_numeric_strings() {
        assert_eq!(amount(Some(&json!(12.5))).unwrap(), 12.5);
        assert_eq!(amount(Some(&json!("1,234.50"))).unwrap(), 1234.5);
        assert_eq!(amount(Some(&json!(" "))).unwrap(), 0.0);
        assert_eq!(amount(None).unwrap(), 0.0);
    }

    #[test]
    fn amount_rejects_text() {
        assert!(amount(Some(&json!("twelve"))).is_err());
        assert!(amount(Some(&json!(true))).is_err());
    }

    #[test]
    fn excel_serial_dates() {
        assert_eq!(excel_serial_to_date(25569.0), Some(d(1970, 1, 1)));
        assert_eq!(excel_serial_to_date(45292.75), Some(d(2024, 1, 1)));
        assert_eq!(excel_serial_to_date(-1.0), None);
    }

    #[test]
    fn string_dates_in_several_formats() {
        assert_eq!(parse_date_str("2024-02-29"), Some(d(2024, 2, 29)));
        assert_eq!(parse_date_str("02/29/2024"), Some(d(2024, 2, 29)));
        assert_eq!(parse_date_str("2024/02/29"), Some(d(2024, 2, 29)));
        assert_eq!(
            parse_date_str("2024-02-29T23:00:00+00:00"),
            Some(d(2024, 2, 29))
        );
        assert_eq!(parse_date_str("someday"), None);
    }

    #[test]
    fn date_falls_back_to_today() {
        let today = d(2025, 6, 1);
        assert_eq!(date(None, today), today);
        assert_eq!(date(Some(&json!("not a date")), today), today);
        assert_eq!(date(Some(&json!(true)), today), today);
        assert_eq!(date(Some(&json!("2020-01-15")), today), d(2020, 1, 15));
    }
}
