//! Ledger cells that keep whatever the backing store holds.
//!
//! Dates and yes/no flags arrive in many shapes once a document has been
//! through a spreadsheet. A cell stores the value exactly as received and
//! interprets it on demand, so writing a ledger back never rewrites a value
//! the client could not read.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A date or timestamp cell.
///
/// Readable forms are a plain `YYYY-MM-DD` day, an RFC 3339 timestamp, and
/// a `YYYY-MM-DD hh:mm[:ss]` local date-time. Anything else is kept verbatim
/// and has no day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateCell(Value);

impl DateCell {
    #[must_use]
    pub fn from_day(day: NaiveDate) -> Self {
        Self(Value::String(day.format("%Y-%m-%d").to_string()))
    }

    #[must_use]
    pub fn from_instant(at: DateTime<Utc>) -> Self {
        Self(Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)))
    }

    /// `null`, absent, or blank text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// `null` or absent; blank text still counts as present.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        self.0.is_null()
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// The calendar day this cell names, as seen from `zone`.
    ///
    /// Plain days and local date-times are taken as written; timestamps
    /// carrying an offset are converted into `zone` first, so
    /// `2025-03-09T21:00:00Z` is the 10th at `+03:00`.
    #[must_use]
    pub fn day_in(&self, zone: &FixedOffset) -> Option<NaiveDate> {
        let raw = self.text()?;
        if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(day);
        }
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(zone).date_naive());
        }
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|local| local.date())
    }

    /// The instant this cell names, when it is an RFC 3339 timestamp.
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.text()?)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    fn text(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) => Some(s.trim()),
            _ => None,
        }
    }
}

impl From<NaiveDate> for DateCell {
    fn from(day: NaiveDate) -> Self {
        Self::from_day(day)
    }
}

impl std::fmt::Display for DateCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// A yes/no cell.
///
/// `true`, and the text `"true"` in any case, read as set. Every other value
/// reads as unset but is written back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flag(Value);

impl Flag {
    #[must_use]
    pub fn is_set(&self) -> bool {
        match &self.0 {
            Value::Bool(b) => *b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        }
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self(Value::Bool(false))
    }
}

impl From<bool> for Flag {
    fn from(set: bool) -> Self {
        Self(Value::Bool(set))
    }
}
