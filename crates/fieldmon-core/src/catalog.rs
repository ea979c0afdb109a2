//! Store catalog: the static list of retail locations.
//!
//! The catalog source is a comma-delimited text file whose first line is a
//! header: `id, address, lat, lng, offices`. `offices` is itself a
//! comma-joined list and is usually double-quoted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{StoreId, StorePosition};
use crate::ConfigError;

/// A retail location from the catalog.
///
/// Coordinates are `NaN` when the catalog value did not parse; such a store
/// cannot be placed on a map but still takes part in classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub offices: Vec<String>,
}

impl Store {
    #[must_use]
    pub fn has_coordinates(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Returns `true` if any affiliated office name contains `token`.
    #[must_use]
    pub fn has_office_matching(&self, token: &str) -> bool {
        self.offices.iter().any(|office| office.contains(token))
    }

    /// Human-readable office list, `"no offices"` when there are none.
    #[must_use]
    pub fn offices_label(&self) -> String {
        if self.offices.is_empty() {
            "no offices".to_string()
        } else {
            self.offices.join(", ")
        }
    }
}

/// The loaded catalog, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    stores: Vec<Store>,
}

impl Catalog {
    #[must_use]
    pub fn from_stores(stores: Vec<Store>) -> Self {
        Self { stores }
    }

    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::from_stores(parse_catalog(text))
    }

    #[must_use]
    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &StoreId) -> Option<&Store> {
        self.stores.iter().find(|s| &s.id == id)
    }

    /// Overwrites a store's coordinates. Returns `false` if the id is unknown.
    pub fn update_coordinates(&mut self, id: &StoreId, lat: f64, lng: f64) -> bool {
        match self.stores.iter_mut().find(|s| &s.id == id) {
            Some(store) => {
                store.lat = lat;
                store.lng = lng;
                true
            }
            None => false,
        }
    }

    /// Applies coordinate overrides by store id and returns how many took effect.
    ///
    /// Overrides with non-finite coordinates or unknown ids are skipped and
    /// the catalog coordinate is kept.
    pub fn apply_positions(&mut self, positions: &[StorePosition]) -> usize {
        let mut applied = 0;
        for position in positions {
            let Some(store_id) = position.store_id.as_ref().filter(|_| position.is_valid()) else {
                tracing::debug!(store_id = ?position.store_id, "ignoring invalid position override");
                continue;
            };
            if self.update_coordinates(store_id, position.lat, position.lng) {
                applied += 1;
            }
        }
        applied
    }
}

/// Reads and parses the catalog file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::CatalogFileIo`] if the file cannot be read. Row-level
/// problems never fail the load.
pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::CatalogFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    let catalog = Catalog::parse(&content);
    tracing::debug!(path = %path.display(), stores = catalog.len(), "loaded store catalog");
    Ok(catalog)
}

/// Parses catalog text into stores.
///
/// The first non-blank line is the header and is discarded. Every other
/// non-blank line with at least four fields yields exactly one store; lines
/// with fewer fields are skipped.
#[must_use]
pub fn parse_catalog(text: &str) -> Vec<Store> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .skip(1)
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<Store> {
    let fields = split_quoted_line(line);
    if fields.len() < 4 {
        tracing::debug!(line, "skipping catalog row with fewer than 4 fields");
        return None;
    }

    let offices = fields
        .get(4)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|office| !office.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Some(Store {
        id: StoreId::parse(&fields[0]),
        address: fields[1].clone(),
        lat: parse_coordinate(&fields[2]),
        lng: parse_coordinate(&fields[3]),
        offices,
    })
}

fn parse_coordinate(raw: &str) -> f64 {
    raw.parse::<f64>().unwrap_or(f64::NAN)
}

/// Splits one delimited line into trimmed fields.
///
/// A comma inside double quotes is literal. Quote characters toggle the
/// quoted state and are dropped from the output; doubled quotes are not
/// treated as escapes.
#[must_use]
pub fn split_quoted_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    fields.push(current.trim().to_string());
    fields
}
