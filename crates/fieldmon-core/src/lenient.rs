//! Forgiving deserializers for ledger fields.
//!
//! Documents round-tripped through a spreadsheet come back with every cell as
//! text, so each helper accepts both the typed JSON value and its string form.
//! None of them fail: an unusable value decodes to a neutral default.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::types::StoreId;

/// A store reference. Numbers and strings are ids; `null`, absent and any
/// other shape reference no store.
pub(crate) fn store_id<'de, D>(deserializer: D) -> Result<Option<StoreId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(value @ (Value::Number(_) | Value::String(_))) => StoreId::deserialize(value).ok(),
        _ => None,
    })
}

/// A number or numeric string. Anything else decodes as `NaN`.
pub(crate) fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

/// Free text; scalars are rendered as strings and `null` becomes empty.
pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

/// A collection decoded record by record.
///
/// Entries that are not records are dropped with a warning instead of
/// failing the whole document; a collection that is not an array is empty.
pub(crate) fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(entries)) => entries,
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(other) => {
            tracing::warn!(
                record = std::any::type_name::<T>(),
                found = %other,
                "ledger collection is not an array; treating it as empty"
            );
            return Ok(Vec::new());
        }
    };

    let total = entries.len();
    let mut kept = Vec::with_capacity(total);
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<T>(entry) {
            Ok(record) => kept.push(record),
            Err(e) => tracing::warn!(
                record = std::any::type_name::<T>(),
                index,
                error = %e,
                "skipping unreadable ledger record"
            ),
        }
    }
    if kept.len() < total {
        tracing::warn!(
            record = std::any::type_name::<T>(),
            kept = kept.len(),
            skipped = total - kept.len(),
            "ledger collection decoded partially"
        );
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default, deserialize_with = "store_id")]
        tk: Option<StoreId>,
        #[serde(default = "nan", deserialize_with = "coordinate")]
        coord: f64,
        #[serde(default, deserialize_with = "text")]
        text: String,
    }

    #[derive(Debug, Deserialize)]
    struct Rows {
        #[serde(default, deserialize_with = "records")]
        rows: Vec<Row>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Row {
        n: i64,
    }

    fn nan() -> f64 {
        f64::NAN
    }

    fn decode(json: &str) -> Fields {
        serde_json::from_str(json).expect("lenient fields always decode")
    }

    fn rows(json: &str) -> Vec<Row> {
        serde_json::from_str::<Rows>(json)
            .expect("lenient collections always decode")
            .rows
    }

    #[test]
    fn store_id_tolerates_missing_and_odd_values() {
        assert_eq!(decode(r#"{"tk": 12}"#).tk, Some(StoreId::Number(12)));
        assert_eq!(decode(r#"{"tk": "12"}"#).tk, Some(StoreId::Number(12)));
        assert_eq!(
            decode(r#"{"tk": "TK-9"}"#).tk,
            Some(StoreId::Text("TK-9".to_string()))
        );
        assert_eq!(decode(r#"{"tk": null}"#).tk, None);
        assert_eq!(decode("{}").tk, None);
        assert_eq!(decode(r#"{"tk": [1]}"#).tk, None);
    }

    #[test]
    fn coordinate_parses_numeric_strings_and_degrades_to_nan() {
        assert!((decode(r#"{"coord": 55.75}"#).coord - 55.75).abs() < f64::EPSILON);
        assert!((decode(r#"{"coord": " 37.6 "}"#).coord - 37.6).abs() < f64::EPSILON);
        assert!(decode(r#"{"coord": "north"}"#).coord.is_nan());
        assert!(decode(r#"{"coord": null}"#).coord.is_nan());
        assert!(decode("{}").coord.is_nan());
    }

    #[test]
    fn text_renders_scalars() {
        assert_eq!(decode(r#"{"text": 42}"#).text, "42");
        assert_eq!(decode(r#"{"text": null}"#).text, "");
        assert_eq!(decode(r#"{"text": "ok"}"#).text, "ok");
    }

    #[test]
    fn records_skip_only_the_unreadable_entries() {
        assert_eq!(
            rows(r#"{"rows": [{"n": 1}, "junk", {"n": "two"}, {"n": 3}]}"#),
            vec![Row { n: 1 }, Row { n: 3 }]
        );
    }

    #[test]
    fn records_treat_null_missing_and_non_arrays_as_empty() {
        assert!(rows(r#"{"rows": null}"#).is_empty());
        assert!(rows("{}").is_empty());
        assert!(rows(r#"{"rows": {"n": 1}}"#).is_empty());
    }
}
