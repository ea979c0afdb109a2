//! Ledger records and the store identifier they reference.
//!
//! Field names on the wire are fixed by the backing store (`tk`, `user`,
//! `timestamp`, ...); the Rust names describe what the fields mean.

use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::cell::{DateCell, Flag};
use crate::lenient;

/// Identifier of a retail location.
///
/// Catalog ids are usually numeric but some are free text. Purely numeric
/// strings are normalised to [`StoreId::Number`] on every entry path, so an
/// id that went through a spreadsheet as `"17"` still matches `17`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "RawStoreId")]
pub enum StoreId {
    Number(i64),
    Text(String),
}

impl StoreId {
    /// Parses a raw catalog or command-line value.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = trimmed.parse::<i64>() {
                return StoreId::Number(n);
            }
        }
        StoreId::Text(trimmed.to_string())
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreId::Number(n) => write!(f, "{n}"),
            StoreId::Text(s) => f.write_str(s),
        }
    }
}

impl std::str::FromStr for StoreId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StoreId::parse(s))
    }
}

impl From<i64> for StoreId {
    fn from(n: i64) -> Self {
        StoreId::Number(n)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        StoreId::parse(s)
    }
}

impl Serialize for StoreId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StoreId::Number(n) => serializer.serialize_i64(*n),
            StoreId::Text(s) => serializer.serialize_str(s),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStoreId {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<RawStoreId> for StoreId {
    fn from(raw: RawStoreId) -> Self {
        match raw {
            RawStoreId::Int(n) => StoreId::Number(n),
            #[allow(clippy::cast_possible_truncation)]
            RawStoreId::Float(f) if f.fract() == 0.0 && f.is_finite() => StoreId::Number(f as i64),
            RawStoreId::Float(f) => StoreId::Text(f.to_string()),
            RawStoreId::Text(s) => StoreId::parse(&s),
        }
    }
}

/// An observation made at a store on a given day.
///
/// Fields the client does not know are carried in `extra` and written back
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// `None` when the stored reference is missing or unusable; such a
    /// visit belongs to no store but is still written back.
    #[serde(rename = "tk", default, deserialize_with = "lenient::store_id")]
    pub store_id: Option<StoreId>,
    /// Calendar day of the visit. Visits whose date has no day never count
    /// as recent.
    #[serde(default)]
    pub date: DateCell,
    #[serde(rename = "user", default, deserialize_with = "lenient::text")]
    pub observer: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub comment: String,
    #[serde(default)]
    pub our_presence: Flag,
    #[serde(default)]
    pub other_presence: Flag,
    #[serde(rename = "timestamp", default, skip_serializing_if = "DateCell::is_absent")]
    pub recorded_at: DateCell,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Visit {
    #[must_use]
    pub fn new(store_id: StoreId, day: NaiveDate) -> Self {
        Self {
            store_id: Some(store_id),
            date: DateCell::from_day(day),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_for(&self, store_id: &StoreId) -> bool {
        self.store_id.as_ref() == Some(store_id)
    }

    /// Day of the visit as seen from `zone`.
    #[must_use]
    pub fn day(&self, zone: &FixedOffset) -> Option<NaiveDate> {
        self.date.day_in(zone)
    }
}

/// An assignment attached to a store. `done` flips once and never back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "tk", default, deserialize_with = "lenient::store_id")]
    pub store_id: Option<StoreId>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub text: String,
    #[serde(default)]
    pub done: Flag,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    #[must_use]
    pub fn new(store_id: StoreId, text: impl Into<String>) -> Self {
        Self {
            store_id: Some(store_id),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Open task for `store_id`.
    #[must_use]
    pub fn is_open_for(&self, store_id: &StoreId) -> bool {
        self.store_id.as_ref() == Some(store_id) && !self.done.is_set()
    }
}

/// A visit scheduled for a future day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(rename = "tk", default, deserialize_with = "lenient::store_id")]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub date: DateCell,
    #[serde(default, deserialize_with = "lenient::text")]
    pub note: String,
    #[serde(rename = "timestamp", default, skip_serializing_if = "DateCell::is_absent")]
    pub recorded_at: DateCell,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plan {
    #[must_use]
    pub fn is_for(&self, store_id: &StoreId) -> bool {
        self.store_id.as_ref() == Some(store_id)
    }
}

/// A coordinate override for a catalog store.
///
/// Unparseable stored coordinates decode as `NaN`; see
/// [`StorePosition::is_valid`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorePosition {
    #[serde(rename = "tk", default, deserialize_with = "lenient::store_id")]
    pub store_id: Option<StoreId>,
    #[serde(default = "nan", deserialize_with = "lenient::coordinate")]
    pub lat: f64,
    #[serde(default = "nan", deserialize_with = "lenient::coordinate")]
    pub lng: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn nan() -> f64 {
    f64::NAN
}

impl StorePosition {
    #[must_use]
    pub fn new(store_id: StoreId, lat: f64, lng: f64) -> Self {
        Self {
            store_id: Some(store_id),
            lat,
            lng,
            extra: Map::new(),
        }
    }

    /// Finite coordinates for a known store.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.store_id.is_some() && self.lat.is_finite() && self.lng.is_finite()
    }
}
