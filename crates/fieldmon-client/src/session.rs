//! Application state for one client and the operations that mutate it.
//!
//! Every mutation follows the same contract: change the in-memory ledger,
//! then write the entire ledger to the remote endpoint. A failed write is
//! reported to the caller and the ledger is saved to the local cache instead.
//! There is no replay queue: the next successful write carries everything,
//! but a hydrate after another client's write discards unsynced local work.

use chrono::{NaiveDate, Utc};
use fieldmon_core::{
    Catalog, DateCell, Flag, Ledger, Plan, Presence, PresencePolicy, StoreId, StorePresence, Visit,
};
use serde::Serialize;

use crate::cache::LocalCache;
use crate::client::LedgerClient;
use crate::error::GatewayError;

/// Where [`FieldSession::hydrate`] got its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrateSource {
    Remote,
    Cache,
}

/// Result of a mutation, for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// `true` when the remote endpoint accepted the write.
    pub success: bool,
}

impl SaveOutcome {
    const SAVED: Self = Self { success: true };
    const FAILED: Self = Self { success: false };
}

/// A visit as entered in the visit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitInput {
    pub store_id: StoreId,
    pub date: NaiveDate,
    pub observer: String,
    pub comment: String,
    pub our_presence: bool,
    pub other_presence: bool,
}

pub struct FieldSession {
    catalog: Catalog,
    ledger: Ledger,
    active_edit_target: Option<StoreId>,
    policy: PresencePolicy,
    client: LedgerClient,
    cache: LocalCache,
}

impl FieldSession {
    /// Creates a session with an empty ledger; call [`FieldSession::hydrate`] next.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        policy: PresencePolicy,
        client: LedgerClient,
        cache: LocalCache,
    ) -> Self {
        Self {
            catalog,
            ledger: Ledger::default(),
            active_edit_target: None,
            policy,
            client,
            cache,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub fn policy(&self) -> &PresencePolicy {
        &self.policy
    }

    #[must_use]
    pub fn active_edit_target(&self) -> Option<&StoreId> {
        self.active_edit_target.as_ref()
    }

    /// Replaces the edit selection and returns the previous one.
    pub fn set_edit_target(&mut self, target: Option<StoreId>) -> Option<StoreId> {
        std::mem::replace(&mut self.active_edit_target, target)
    }

    /// Selects `store_id` for editing, or clears the selection if it is
    /// already selected. Returns the new selection.
    pub fn toggle_edit_target(&mut self, store_id: StoreId) -> Option<&StoreId> {
        if self.active_edit_target.as_ref() == Some(&store_id) {
            self.active_edit_target = None;
        } else {
            self.active_edit_target = Some(store_id);
        }
        self.active_edit_target.as_ref()
    }

    /// Loads the ledger, preferring the remote endpoint.
    ///
    /// On success visits, tasks and plans are adopted wholesale, position
    /// overrides are applied to the catalog, and the result is mirrored to
    /// the local cache. On failure the same happens from the cache, where
    /// each collection independently defaults to empty.
    pub async fn hydrate(&mut self) -> HydrateSource {
        let (fetched, source) = match self.client.fetch().await {
            Ok(ledger) => (ledger, HydrateSource::Remote),
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.client.endpoint(),
                    error = %e,
                    "ledger fetch failed; falling back to local cache"
                );
                (self.cache.load().await, HydrateSource::Cache)
            }
        };

        self.ledger = fetched;
        let applied = self.catalog.apply_positions(&self.ledger.store_positions);

        if source == HydrateSource::Remote {
            if let Err(e) = self.cache.store(&self.ledger).await {
                tracing::warn!(error = %e, "failed to mirror ledger into local cache");
            }
        }

        tracing::info!(
            source = ?source,
            visits = self.ledger.visits.len(),
            tasks = self.ledger.tasks.len(),
            plans = self.ledger.plans.len(),
            positions_applied = applied,
            "ledger hydrated"
        );
        source
    }

    /// Re-reads visits, tasks and plans from the remote endpoint.
    ///
    /// Position overrides are not reconciled. On failure the in-memory
    /// ledger is left as it was.
    ///
    /// # Errors
    ///
    /// Returns the [`GatewayError`] from the fetch.
    pub async fn refresh(&mut self) -> Result<(), GatewayError> {
        let fetched = self.client.fetch().await?;
        self.ledger.adopt_records(fetched);
        tracing::debug!(visits = self.ledger.visits.len(), "ledger refreshed");
        Ok(())
    }

    /// Records a visit ahead of all earlier ones and persists the ledger.
    pub async fn record_visit(&mut self, input: VisitInput) -> SaveOutcome {
        self.ledger.record_visit(Visit {
            observer: input.observer,
            comment: input.comment,
            our_presence: Flag::from(input.our_presence),
            other_presence: Flag::from(input.other_presence),
            recorded_at: DateCell::from_instant(Utc::now()),
            ..Visit::new(input.store_id, input.date)
        });
        self.persist().await
    }

    /// Schedules a future visit and persists the ledger.
    pub async fn schedule_plan(
        &mut self,
        store_id: StoreId,
        date: NaiveDate,
        note: String,
    ) -> SaveOutcome {
        self.ledger.schedule_plan(Plan {
            store_id: Some(store_id),
            date: DateCell::from_day(date),
            note,
            recorded_at: DateCell::from_instant(Utc::now()),
            ..Plan::default()
        });
        self.persist().await
    }

    /// Closes the first open task for the store and persists the ledger.
    ///
    /// Without an open task nothing changes and nothing is written.
    pub async fn complete_task(&mut self, store_id: &StoreId) -> SaveOutcome {
        if !self.ledger.complete_task(store_id) {
            tracing::debug!(store_id = %store_id, "no open task to complete");
            return SaveOutcome::SAVED;
        }
        self.persist().await
    }

    /// Moves a store, records the override and persists the ledger.
    ///
    /// Non-finite coordinates are refused without touching any state.
    pub async fn update_store_position(
        &mut self,
        store_id: &StoreId,
        lat: f64,
        lng: f64,
    ) -> SaveOutcome {
        if !(lat.is_finite() && lng.is_finite()) {
            tracing::warn!(store_id = %store_id, lat, lng, "refusing non-finite store position");
            return SaveOutcome::FAILED;
        }
        if !self.catalog.update_coordinates(store_id, lat, lng) {
            tracing::warn!(store_id = %store_id, "position override for a store missing from the catalog");
        }
        self.ledger.set_store_position(store_id, lat, lng);
        self.persist().await
    }

    #[must_use]
    pub fn presence(&self, store_id: &StoreId, today: NaiveDate) -> Presence {
        self.policy.classify(
            store_id,
            &self.ledger,
            &self.catalog,
            today,
            self.active_edit_target.as_ref(),
        )
    }

    /// Derived state of every catalog store, in catalog order.
    #[must_use]
    pub fn presence_map(&self, today: NaiveDate) -> Vec<StorePresence> {
        self.policy.classify_all(
            &self.ledger,
            &self.catalog,
            today,
            self.active_edit_target.as_ref(),
        )
    }

    async fn persist(&self) -> SaveOutcome {
        match self.client.save(&self.ledger).await {
            Ok(()) => {
                tracing::debug!(endpoint = %self.client.endpoint(), "ledger saved");
                SaveOutcome::SAVED
            }
            Err(e) => {
                tracing::warn!(
                    endpoint = %self.client.endpoint(),
                    error = %e,
                    "ledger save failed; keeping changes in local cache"
                );
                if let Err(cache_err) = self.cache.store(&self.ledger).await {
                    tracing::error!(error = %cache_err, "failed to write local cache");
                }
                SaveOutcome::FAILED
            }
        }
    }
}
