//! Window summaries and per-store detail views.

use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate};
use serde::Serialize;

use crate::catalog::Store;
use crate::ledger::Ledger;
use crate::presence::{is_within_window, Presence, PresencePolicy, StorePresence, MAX_WINDOW_DAYS};
use crate::types::{Plan, StoreId, Task, Visit};

/// Distinct stores observed during the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowSummary {
    /// Stores with at least one observation of either kind.
    pub visited: usize,
    pub ours: usize,
    pub others: usize,
}

impl WindowSummary {
    /// Visits without a store reference are not counted.
    #[must_use]
    pub fn compute(ledger: &Ledger, today: NaiveDate, policy: &PresencePolicy) -> Self {
        let mut ours = BTreeSet::new();
        let mut others = BTreeSet::new();

        for visit in recent_visits(ledger, today, policy) {
            let Some(store_id) = visit.store_id.as_ref() else { continue };
            if visit.our_presence.is_set() {
                ours.insert(store_id);
            }
            if visit.other_presence.is_set() {
                others.insert(store_id);
            }
        }

        Self {
            visited: ours.union(&others).count(),
            ours: ours.len(),
            others: others.len(),
        }
    }
}

/// Observation counts for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub our: usize,
    pub other: usize,
}

/// One bucket per day for the window's days ending today, oldest first.
///
/// The bucket count never exceeds [`MAX_WINDOW_DAYS`]. Visits dated outside
/// the buckets are not counted.
#[must_use]
pub fn daily_breakdown(ledger: &Ledger, today: NaiveDate, policy: &PresencePolicy) -> Vec<DailyCount> {
    let days = policy.window_days.clamp(0, MAX_WINDOW_DAYS);
    let mut buckets: Vec<DailyCount> = (0..days)
        .rev()
        .map(|offset| DailyCount {
            date: today - chrono::Duration::days(offset),
            our: 0,
            other: 0,
        })
        .collect();

    for visit in &ledger.visits {
        let Some(date) = visit.day(&policy.zone) else { continue };
        if let Some(bucket) = buckets.iter_mut().find(|b| b.date == date) {
            bucket.our += usize::from(visit.our_presence.is_set());
            bucket.other += usize::from(visit.other_presence.is_set());
        }
    }

    buckets
}

fn recent_visits<'a>(
    ledger: &'a Ledger,
    today: NaiveDate,
    policy: &'a PresencePolicy,
) -> impl Iterator<Item = &'a Visit> + 'a {
    ledger.visits.iter().filter(move |v| {
        v.day(&policy.zone)
            .is_some_and(|date| is_within_window(date, today, policy.window_days))
    })
}

/// Number of stores in each presence state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PresenceCounts {
    pub our: usize,
    pub other: usize,
    pub editing: usize,
    pub none: usize,
}

#[must_use]
pub fn presence_counts(states: &[StorePresence]) -> PresenceCounts {
    states
        .iter()
        .fold(PresenceCounts::default(), |mut acc, state| {
            match state.presence {
                Presence::Our => acc.our += 1,
                Presence::Other => acc.other += 1,
                Presence::Editing => acc.editing += 1,
                Presence::None => acc.none += 1,
            }
            acc
        })
}

/// Everything shown for a single store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreDetail {
    pub store_id: StoreId,
    pub address: String,
    pub offices_label: String,
    /// Newest visit date first; undated visits last.
    pub visits: Vec<Visit>,
    pub active_task: Option<Task>,
    pub plans: Vec<Plan>,
    /// Flags of the most recent visit, `false` when there is none.
    pub last_our_presence: bool,
    pub last_other_presence: bool,
}

impl StoreDetail {
    /// Visit days are read in `zone`.
    #[must_use]
    pub fn build(store: &Store, ledger: &Ledger, zone: &FixedOffset) -> Self {
        let mut visits: Vec<Visit> = ledger.visits_for(&store.id).cloned().collect();
        // Stable sort keeps ledger order (newest recorded first) within a day.
        visits.sort_by_cached_key(|v| std::cmp::Reverse(v.day(zone)));

        let (last_our_presence, last_other_presence) = visits.first().map_or((false, false), |v| {
            (v.our_presence.is_set(), v.other_presence.is_set())
        });

        Self {
            store_id: store.id.clone(),
            address: store.address.clone(),
            offices_label: store.offices_label(),
            active_task: ledger.active_task(&store.id).cloned(),
            plans: ledger.plans_for(&store.id).cloned().collect(),
            visits,
            last_our_presence,
            last_other_presence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Flag;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()
    }

    fn policy() -> PresencePolicy {
        PresencePolicy::new("Ours")
    }

    fn visit(id: i64, days_ago: i64, ours: bool, other: bool) -> Visit {
        Visit {
            observer: "rep".to_string(),
            comment: format!("{days_ago} days ago"),
            our_presence: Flag::from(ours),
            other_presence: Flag::from(other),
            ..Visit::new(
                StoreId::Number(id),
                today() - chrono::Duration::days(days_ago),
            )
        }
    }

    #[test]
    fn window_summary_counts_distinct_stores() {
        let ledger = Ledger {
            visits: vec![
                visit(1, 0, true, false),
                visit(1, 3, true, true),
                visit(2, 5, false, true),
                visit(3, 20, true, false),
                visit(4, -2, true, false),
            ],
            ..Ledger::default()
        };
        let summary = WindowSummary::compute(&ledger, today(), &policy());
        assert_eq!(
            summary,
            WindowSummary {
                visited: 2,
                ours: 1,
                others: 2
            }
        );
    }

    #[test]
    fn daily_breakdown_has_one_bucket_per_day_ending_today() {
        let ledger = Ledger {
            visits: vec![
                visit(1, 0, true, true),
                visit(2, 0, false, true),
                visit(3, 13, true, false),
                visit(4, 14, true, false),
            ],
            ..Ledger::default()
        };
        let days = daily_breakdown(&ledger, today(), &policy());
        assert_eq!(days.len(), 14);
        assert_eq!(days[0].date, today() - chrono::Duration::days(13));
        assert_eq!(days[0].our, 1);
        let last = days.last().unwrap();
        assert_eq!(last.date, today());
        assert_eq!((last.our, last.other), (1, 2));
        let total_our: usize = days.iter().map(|d| d.our).sum();
        assert_eq!(total_our, 2);
    }

    #[test]
    fn daily_breakdown_never_exceeds_a_year_of_buckets() {
        let mut wide = policy();
        wide.window_days = i64::from(u32::MAX);
        let days = daily_breakdown(&Ledger::default(), today(), &wide);
        assert_eq!(days.len(), 366);
        assert_eq!(days.last().map(|d| d.date), Some(today()));

        wide.window_days = 0;
        assert!(daily_breakdown(&Ledger::default(), today(), &wide).is_empty());
    }

    #[test]
    fn visits_without_a_store_are_not_summarised() {
        let mut orphan = visit(1, 0, true, true);
        orphan.store_id = None;
        let ledger = Ledger {
            visits: vec![orphan],
            ..Ledger::default()
        };
        assert_eq!(
            WindowSummary::compute(&ledger, today(), &policy()),
            WindowSummary::default()
        );
        assert_eq!(daily_breakdown(&ledger, today(), &policy()).last().map(|d| d.our), Some(1));
    }

    #[test]
    fn presence_counts_tally_states() {
        let states = [Presence::Our, Presence::Our, Presence::None, Presence::Editing]
            .into_iter()
            .enumerate()
            .map(|(i, presence)| StorePresence {
                store_id: StoreId::Number(i64::try_from(i).unwrap()),
                presence,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            presence_counts(&states),
            PresenceCounts {
                our: 2,
                other: 0,
                editing: 1,
                none: 1
            }
        );
    }

    #[test]
    fn store_detail_sorts_visits_and_surfaces_first_open_task() {
        let store = Store {
            id: StoreId::Number(1),
            address: "1 Main St".to_string(),
            lat: 55.0,
            lng: 37.0,
            offices: vec![],
        };
        let ledger = Ledger {
            visits: vec![
                visit(1, 5, false, true),
                visit(2, 0, true, false),
                visit(1, 1, true, false),
            ],
            tasks: vec![
                Task {
                    done: Flag::from(true),
                    ..Task::new(StoreId::Number(1), "old")
                },
                Task::new(StoreId::Number(1), "photograph shelf"),
            ],
            ..Ledger::default()
        };
        let detail = StoreDetail::build(&store, &ledger, &policy().zone);
        assert_eq!(detail.offices_label, "no offices");
        assert_eq!(detail.visits.len(), 2);
        assert_eq!(detail.visits[0].comment, "1 days ago");
        assert!(detail.last_our_presence);
        assert!(!detail.last_other_presence);
        assert_eq!(
            detail.active_task.map(|t| t.text),
            Some("photograph shelf".to_string())
        );
    }
}
