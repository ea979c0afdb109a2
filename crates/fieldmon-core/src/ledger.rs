//! The ledger: every mutable record the field team produces.
//!
//! A [`Ledger`] is both the in-memory state and the wire document exchanged
//! with the backing store. Writes always carry whole collections; on the
//! store side [`merge_collections`] replaces only the collections a write
//! names and leaves the rest of the document alone.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cell::Flag;
use crate::lenient;
use crate::types::{Plan, StoreId, StorePosition, Task, Visit};

/// Value of a write body's `action` asking the store to log one visit
/// instead of replacing collections.
pub const APPEND_VISIT_ACTION: &str = "append_visit";

/// Top-level keys of the ledger document.
pub const COLLECTION_KEYS: [&str; 4] = ["visits", "tasks", "plans", "store_positions"];

/// Visits (newest first), tasks, plans and coordinate overrides.
///
/// Each collection decodes record by record: an entry that is not a record
/// is dropped with a warning and the rest of the document still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledger {
    #[serde(deserialize_with = "lenient::records")]
    pub visits: Vec<Visit>,
    #[serde(deserialize_with = "lenient::records")]
    pub tasks: Vec<Task>,
    #[serde(deserialize_with = "lenient::records")]
    pub plans: Vec<Plan>,
    #[serde(deserialize_with = "lenient::records")]
    pub store_positions: Vec<StorePosition>,
}

impl Ledger {
    /// Inserts a visit ahead of all existing ones.
    pub fn record_visit(&mut self, visit: Visit) {
        self.visits.insert(0, visit);
    }

    pub fn schedule_plan(&mut self, plan: Plan) {
        self.plans.push(plan);
    }

    /// Marks the first not-done task for `store_id` as done.
    ///
    /// Returns `false` when the store has no active task; calling it again
    /// after the last task is closed changes nothing.
    pub fn complete_task(&mut self, store_id: &StoreId) -> bool {
        match self.tasks.iter_mut().find(|t| t.is_open_for(store_id)) {
            Some(task) => {
                task.done = Flag::from(true);
                true
            }
            None => false,
        }
    }

    /// Records a coordinate override, replacing the coordinates of any
    /// earlier one for the store.
    pub fn set_store_position(&mut self, store_id: &StoreId, lat: f64, lng: f64) {
        match self
            .store_positions
            .iter_mut()
            .find(|p| p.store_id.as_ref() == Some(store_id))
        {
            Some(existing) => {
                existing.lat = lat;
                existing.lng = lng;
            }
            None => self
                .store_positions
                .push(StorePosition::new(store_id.clone(), lat, lng)),
        }
    }

    pub fn visits_for<'a>(&'a self, store_id: &'a StoreId) -> impl Iterator<Item = &'a Visit> + 'a {
        self.visits.iter().filter(move |v| v.is_for(store_id))
    }

    /// The task surfaced for a store: the first one still open, in storage order.
    #[must_use]
    pub fn active_task(&self, store_id: &StoreId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.is_open_for(store_id))
    }

    pub fn plans_for<'a>(&'a self, store_id: &'a StoreId) -> impl Iterator<Item = &'a Plan> + 'a {
        self.plans.iter().filter(move |p| p.is_for(store_id))
    }

    /// Replaces visits, tasks and plans, leaving position overrides untouched.
    pub fn adopt_records(&mut self, other: Ledger) {
        self.visits = other.visits;
        self.tasks = other.tasks;
        self.plans = other.plans;
    }
}

/// A write body that cannot be merged into the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("collection '{0}' must be an array or null")]
    NotAnArray(&'static str),
}

/// A document holding every collection, all empty.
#[must_use]
pub fn empty_document() -> Map<String, Value> {
    let mut document = Map::new();
    fill_missing_collections(&mut document);
    document
}

/// Adds an empty array for every collection the document lacks.
pub fn fill_missing_collections(document: &mut Map<String, Value>) {
    for key in COLLECTION_KEYS {
        let slot = document.entry(key).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Array(Vec::new());
        }
    }
}

/// Replaces every collection present and non-null in `patch`.
///
/// Records are copied as raw JSON, so a collection the client could only
/// partly read is still stored in full. Other keys of `document` are kept.
/// Nothing is changed unless every present collection is an array.
///
/// # Errors
///
/// Returns [`PatchError::NotAnArray`] for a collection that is neither an
/// array nor `null`.
pub fn merge_collections(
    document: &mut Map<String, Value>,
    patch: &Map<String, Value>,
) -> Result<Vec<&'static str>, PatchError> {
    let mut replaced = Vec::new();
    for key in COLLECTION_KEYS {
        match patch.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::Array(_)) => replaced.push(key),
            Some(_) => return Err(PatchError::NotAnArray(key)),
        }
    }
    for key in &replaced {
        if let Some(records) = patch.get(*key) {
            document.insert((*key).to_string(), records.clone());
        }
    }
    Ok(replaced)
}

/// The raw visit of an append-visit write, or `None` for an ordinary write.
///
/// `Some(None)` means the action was requested without a visit object.
#[must_use]
pub fn appended_visit(patch: &Map<String, Value>) -> Option<Option<&Map<String, Value>>> {
    match patch.get("action").and_then(Value::as_str) {
        Some(APPEND_VISIT_ACTION) => Some(patch.get("visit").and_then(Value::as_object)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn visit(store: i64, day: u32) -> Visit {
        Visit {
            observer: "rep".to_string(),
            ..Visit::new(
                StoreId::Number(store),
                NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            )
        }
    }

    fn task(store: i64, text: &str, done: bool) -> Task {
        Task {
            done: Flag::from(done),
            ..Task::new(StoreId::Number(store), text)
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn record_visit_prepends() {
        let mut ledger = Ledger::default();
        ledger.record_visit(visit(1, 1));
        ledger.record_visit(visit(2, 2));
        assert_eq!(ledger.visits[0].store_id, Some(StoreId::Number(2)));
        assert_eq!(ledger.visits[1].store_id, Some(StoreId::Number(1)));
    }

    #[test]
    fn schedule_plan_appends() {
        let mut ledger = Ledger::default();
        for (store, note) in [(1, "first"), (2, "second")] {
            ledger.schedule_plan(Plan {
                store_id: Some(StoreId::Number(store)),
                note: note.to_string(),
                ..Plan::default()
            });
        }
        assert_eq!(ledger.plans[1].note, "second");
    }

    #[test]
    fn complete_task_closes_first_open_task_in_storage_order() {
        let mut ledger = Ledger {
            tasks: vec![
                task(1, "done already", true),
                task(2, "other store", false),
                task(1, "first open", false),
                task(1, "second open", false),
            ],
            ..Ledger::default()
        };
        assert!(ledger.complete_task(&StoreId::Number(1)));
        assert!(ledger.tasks[2].done.is_set());
        assert!(!ledger.tasks[3].done.is_set());
        assert!(!ledger.tasks[1].done.is_set());
        assert_eq!(
            ledger.active_task(&StoreId::Number(1)).map(|t| t.text.as_str()),
            Some("second open")
        );
    }

    #[test]
    fn complete_task_is_idempotent_without_open_tasks() {
        let mut ledger = Ledger {
            tasks: vec![task(1, "closed", true)],
            ..Ledger::default()
        };
        let before = ledger.clone();
        assert!(!ledger.complete_task(&StoreId::Number(1)));
        assert!(!ledger.complete_task(&StoreId::Number(1)));
        assert_eq!(ledger, before);
    }

    #[test]
    fn set_store_position_replaces_previous_override() {
        let mut ledger: Ledger = serde_json::from_value(json!({
            "store_positions": [{"tk": 4, "lat": 55.0, "lng": 37.0, "set_by": "anna"}]
        }))
        .unwrap();
        let id = StoreId::Number(4);
        ledger.set_store_position(&id, 56.0, 38.0);
        ledger.set_store_position(&StoreId::Number(5), 50.0, 30.0);
        assert_eq!(ledger.store_positions.len(), 2);
        assert!((ledger.store_positions[0].lat - 56.0).abs() < f64::EPSILON);
        assert_eq!(ledger.store_positions[0].extra["set_by"], "anna");
    }

    #[test]
    fn ledger_missing_keys_default_to_empty() {
        let ledger: Ledger = serde_json::from_str(r#"{"visits":[],"tasks":null}"#).unwrap();
        assert!(ledger.tasks.is_empty());
        assert!(ledger.plans.is_empty());
        assert!(ledger.store_positions.is_empty());
    }

    #[test]
    fn one_bad_record_does_not_empty_the_ledger() {
        let ledger: Ledger = serde_json::from_value(json!({
            "visits": [
                {"tk": 1, "date": "2025-06-01", "user": "rep"},
                {"date": "2025-06-02", "user": "rep"},
                {"tk": null, "date": "2025-06-03"},
                "not a visit",
                {"tk": 2, "date": "2025-06-04", "our_presence": true}
            ],
            "tasks": [{"tk": 1, "text": "restock"}]
        }))
        .unwrap();
        assert_eq!(ledger.visits.len(), 4);
        assert_eq!(ledger.visits[0].store_id, Some(StoreId::Number(1)));
        assert_eq!(ledger.visits[1].store_id, None);
        assert!(ledger.visits[3].our_presence.is_set());
        assert_eq!(ledger.visits_for(&StoreId::Number(2)).count(), 1);
        assert_eq!(ledger.tasks.len(), 1);
    }

    #[test]
    fn merge_replaces_only_present_collections() {
        let mut document = object(json!({
            "visits": [{"tk": 1}],
            "tasks": [{"tk": 1, "text": "keep me"}],
            "plans": [],
            "store_positions": [],
            "sheet_version": 3
        }));
        let patch = object(json!({"visits": [{"tk": null, "odd": true}], "tasks": null}));
        let replaced = merge_collections(&mut document, &patch).unwrap();
        assert_eq!(replaced, vec!["visits"]);
        assert_eq!(document["visits"], json!([{"tk": null, "odd": true}]));
        assert_eq!(document["tasks"][0]["text"], "keep me");
        assert_eq!(document["sheet_version"], 3);
    }

    #[test]
    fn merge_refuses_non_array_collections_without_changing_anything() {
        let mut document = empty_document();
        let before = document.clone();
        let patch = object(json!({"visits": [{"tk": 1}], "plans": "none"}));
        assert_eq!(
            merge_collections(&mut document, &patch),
            Err(PatchError::NotAnArray("plans"))
        );
        assert_eq!(document, before);
    }

    #[test]
    fn fill_missing_collections_keeps_existing_data() {
        let mut document = object(json!({"visits": [{"tk": 1}], "tasks": null, "extra": 1}));
        fill_missing_collections(&mut document);
        assert_eq!(document["visits"], json!([{"tk": 1}]));
        assert_eq!(document["tasks"], json!([]));
        assert_eq!(document["store_positions"], json!([]));
        assert_eq!(document["extra"], 1);
    }

    #[test]
    fn appended_visit_recognises_the_action() {
        let append = object(json!({"action": "append_visit", "visit": {"tk": 9, "user": "rep"}}));
        assert_eq!(
            appended_visit(&append).flatten().map(|v| v["tk"].clone()),
            Some(json!(9))
        );

        let missing = object(json!({"action": "append_visit"}));
        assert_eq!(appended_visit(&missing), Some(None));

        let plain = object(json!({"visits": []}));
        assert_eq!(appended_visit(&plain), None);
    }

    #[test]
    fn ledger_serializes_every_collection() {
        let json = serde_json::to_value(Ledger::default()).unwrap();
        for key in COLLECTION_KEYS {
            assert!(json[key].is_array(), "missing {key}");
        }
    }
}
