//! Presence classification: which office, if any, is active at a store.
//!
//! Recent visits are the primary signal; the catalog's office list is the
//! fallback. "Today" is always passed in so results are reproducible.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::ledger::Ledger;
use crate::types::StoreId;

pub const DEFAULT_WINDOW_DAYS: i64 = 14;

/// Longest recency window accepted: one leap year.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Offset used to turn timestamps into calendar days unless configured.
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// The default zone, `+03:00`.
#[must_use]
pub fn default_zone() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_UTC_OFFSET_SECS).unwrap_or(Utc.fix())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Presence {
    Our,
    Other,
    Editing,
    None,
}

impl std::fmt::Display for Presence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Presence::Our => write!(f, "OUR"),
            Presence::Other => write!(f, "OTHER"),
            Presence::Editing => write!(f, "EDITING"),
            Presence::None => write!(f, "NONE"),
        }
    }
}

/// A store paired with its derived state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorePresence {
    pub store_id: StoreId,
    pub presence: Presence,
}

/// Whole days from `date` to `today`; negative for future dates.
#[must_use]
pub fn days_since(date: NaiveDate, today: NaiveDate) -> i64 {
    (today - date).num_days()
}

/// `true` when `date` lies in `[today - window_days, today]`.
#[must_use]
pub fn is_within_window(date: NaiveDate, today: NaiveDate, window_days: i64) -> bool {
    (0..=window_days).contains(&days_since(date, today))
}

/// Classification settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresencePolicy {
    /// Substring identifying our office in a catalog office name.
    pub our_office_token: String,
    pub window_days: i64,
    /// Zone in which timestamps become calendar days.
    pub zone: FixedOffset,
}

impl PresencePolicy {
    #[must_use]
    pub fn new(our_office_token: impl Into<String>) -> Self {
        Self {
            our_office_token: our_office_token.into(),
            window_days: DEFAULT_WINDOW_DAYS,
            zone: default_zone(),
        }
    }

    /// Sets the window, clamped to `0..=MAX_WINDOW_DAYS`.
    #[must_use]
    pub fn with_window_days(mut self, window_days: i64) -> Self {
        self.window_days = window_days.clamp(0, MAX_WINDOW_DAYS);
        self
    }

    #[must_use]
    pub fn with_zone(mut self, zone: FixedOffset) -> Self {
        self.zone = zone;
        self
    }

    #[must_use]
    pub fn from_config(config: &crate::AppConfig) -> Self {
        Self::new(config.our_office_token.clone())
            .with_window_days(config.window_days)
            .with_zone(config.utc_offset)
    }

    /// The current calendar day in the policy's zone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.zone).date_naive()
    }

    /// Derives the state of one store. First match wins:
    ///
    /// 1. the active edit target is `Editing`;
    /// 2. a visit in the window observing our office gives `Our`, else one
    ///    observing another office gives `Other`;
    /// 3. a catalog office containing our token gives `Our`, any other
    ///    catalog office gives `Other`;
    /// 4. otherwise `None`.
    ///
    /// Visits dated after `today` are never recent.
    #[must_use]
    pub fn classify(
        &self,
        store_id: &StoreId,
        ledger: &Ledger,
        catalog: &Catalog,
        today: NaiveDate,
        active_edit_target: Option<&StoreId>,
    ) -> Presence {
        if active_edit_target == Some(store_id) {
            return Presence::Editing;
        }

        let mut saw_other = false;
        for visit in ledger.visits_for(store_id) {
            let Some(date) = visit.day(&self.zone) else { continue };
            if !is_within_window(date, today, self.window_days) {
                continue;
            }
            if visit.our_presence.is_set() {
                return Presence::Our;
            }
            saw_other |= visit.other_presence.is_set();
        }
        if saw_other {
            return Presence::Other;
        }

        match catalog.get(store_id) {
            Some(store) if store.has_office_matching(&self.our_office_token) => Presence::Our,
            Some(store) if !store.offices.is_empty() => Presence::Other,
            _ => Presence::None,
        }
    }

    /// Classifies every catalog store, in catalog order.
    #[must_use]
    pub fn classify_all(
        &self,
        ledger: &Ledger,
        catalog: &Catalog,
        today: NaiveDate,
        active_edit_target: Option<&StoreId>,
    ) -> Vec<StorePresence> {
        catalog
            .stores()
            .iter()
            .map(|store| StorePresence {
                store_id: store.id.clone(),
                presence: self.classify(&store.id, ledger, catalog, today, active_edit_target),
            })
            .collect()
    }
}
