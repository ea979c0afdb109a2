//! Command handlers for the CLI.
//!
//! Handlers print to stdout. A write the ledger endpoint did not accept is
//! reported as an error after the change has been kept in the local cache,
//! so scripts see a non-zero exit status.

use std::fmt::Write as _;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Utc};
use fieldmon_client::{poll_until, FieldSession, SaveOutcome, VisitInput};
use fieldmon_core::{
    daily_breakdown, presence_counts, DailyCount, DateCell, Presence, PresenceCounts, Store,
    StoreDetail, StoreId, WindowSummary,
};
use serde_json::json;

pub(crate) fn run_stores(
    session: &FieldSession,
    today: NaiveDate,
    filter: Option<Presence>,
    json: bool,
) -> anyhow::Result<()> {
    let states = session.presence_map(today);
    let rows: Vec<(&Store, Presence)> = session
        .catalog()
        .stores()
        .iter()
        .zip(&states)
        .map(|(store, state)| (store, state.presence))
        .filter(|(_, presence)| filter.is_none_or(|wanted| wanted == *presence))
        .collect();

    if json {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|(store, presence)| {
                json!({
                    "id": store.id,
                    "address": store.address,
                    "lat": finite_or_null(store.lat),
                    "lng": finite_or_null(store.lng),
                    "offices": store.offices,
                    "presence": presence,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    for (store, presence) in &rows {
        println!("{}", format_store_line(store, *presence));
    }
    println!("{} of {} stores", rows.len(), session.catalog().len());
    Ok(())
}

pub(crate) fn run_show(session: &FieldSession, store_id: &StoreId, json: bool) -> anyhow::Result<()> {
    let store = session
        .catalog()
        .get(store_id)
        .ok_or_else(|| anyhow::anyhow!("store '{store_id}' is not in the catalog"))?;
    let zone = session.policy().zone;
    let detail = StoreDetail::build(store, session.ledger(), &zone);

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        print!("{}", render_detail(&detail, &zone));
    }
    Ok(())
}

pub(crate) async fn run_visit(
    session: &mut FieldSession,
    input: VisitInput,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let store_id = input.store_id.clone();
    if session.catalog().get(&store_id).is_none() {
        tracing::warn!(store_id = %store_id, "recording a visit for a store missing from the catalog");
    }
    let outcome = session.record_visit(input).await;
    report_outcome(outcome, "visit recorded")?;
    println!("{store_id}: {}", session.presence(&store_id, today));
    Ok(())
}

pub(crate) async fn run_plan(
    session: &mut FieldSession,
    store_id: StoreId,
    date: NaiveDate,
    note: String,
) -> anyhow::Result<()> {
    let outcome = session.schedule_plan(store_id, date, note).await;
    report_outcome(outcome, "plan scheduled")
}

pub(crate) async fn run_complete_task(
    session: &mut FieldSession,
    store_id: &StoreId,
) -> anyhow::Result<()> {
    let Some(task) = session.ledger().active_task(store_id).cloned() else {
        println!("{store_id} has no open task");
        return Ok(());
    };
    let outcome = session.complete_task(store_id).await;
    report_outcome(outcome, &format!("task completed: {}", task.text))
}

pub(crate) async fn run_move(
    session: &mut FieldSession,
    store_id: &StoreId,
    lat: f64,
    lng: f64,
) -> anyhow::Result<()> {
    if !(lat.is_finite() && lng.is_finite()) {
        anyhow::bail!("coordinates must be finite numbers");
    }
    if session.catalog().get(store_id).is_none() {
        anyhow::bail!("store '{store_id}' is not in the catalog");
    }

    session.set_edit_target(Some(store_id.clone()));
    let outcome = session.update_store_position(store_id, lat, lng).await;
    session.set_edit_target(None);
    report_outcome(outcome, &format!("{store_id} moved to {lat:.6}, {lng:.6}"))
}

pub(crate) fn run_stats(
    session: &FieldSession,
    today: NaiveDate,
    daily: bool,
    json: bool,
) -> anyhow::Result<()> {
    let policy = session.policy();
    let window = policy.window_days;
    let summary = WindowSummary::compute(session.ledger(), today, policy);
    let counts = presence_counts(&session.presence_map(today));
    let days = if daily {
        daily_breakdown(session.ledger(), today, policy)
    } else {
        Vec::new()
    };

    if json {
        let value = json!({
            "window_days": window,
            "summary": summary,
            "presence": counts,
            "daily": days,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render_stats(window, &summary, &counts, &days));
    }
    Ok(())
}

pub(crate) async fn run_watch(session: &mut FieldSession, interval: Duration) {
    println!(
        "watching {} stores every {}s; ctrl-c to stop",
        session.catalog().len(),
        interval.as_secs()
    );
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let zone = session.policy().zone;
    let refreshed = poll_until(
        session,
        interval,
        move || Utc::now().with_timezone(&zone).date_naive(),
        shutdown,
        |_, states| {
            let now = Utc::now().with_timezone(&zone).format("%H:%M:%S");
            println!("{now}  {}", format_counts(&presence_counts(states)));
        },
    )
    .await;
    println!("stopped after {refreshed} successful refreshes");
}

fn report_outcome(outcome: SaveOutcome, done: &str) -> anyhow::Result<()> {
    if outcome.success {
        println!("{done}");
        Ok(())
    } else {
        anyhow::bail!("{done} locally, but the ledger endpoint did not accept the write; kept in local cache")
    }
}

fn finite_or_null(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn format_store_line(store: &Store, presence: Presence) -> String {
    format!(
        "{:>6}  {:<7}  {}  [{}]",
        store.id.to_string(),
        presence.to_string(),
        store.address,
        store.offices_label()
    )
}

fn format_counts(counts: &PresenceCounts) -> String {
    format!(
        "our {}  other {}  editing {}  none {}",
        counts.our, counts.other, counts.editing, counts.none
    )
}

fn render_detail(detail: &StoreDetail, zone: &FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "store {}: {}", detail.store_id, detail.address);
    let _ = writeln!(out, "offices: {}", detail.offices_label);
    let _ = writeln!(
        out,
        "last visit: our {}, other {}",
        yes_no(detail.last_our_presence),
        yes_no(detail.last_other_presence)
    );

    match &detail.active_task {
        Some(task) => {
            let _ = writeln!(out, "open task: {}", task.text);
        }
        None => {
            let _ = writeln!(out, "open task: none");
        }
    }

    let _ = writeln!(out, "visits ({}):", detail.visits.len());
    for visit in &detail.visits {
        let date = visit
            .day(zone)
            .map_or_else(|| date_label(&visit.date), |d| d.to_string());
        let _ = write!(
            out,
            "  {date}  {}  our {} other {}",
            visit.observer,
            yes_no(visit.our_presence.is_set()),
            yes_no(visit.other_presence.is_set())
        );
        if !visit.comment.is_empty() {
            let _ = write!(out, "  \"{}\"", visit.comment);
        }
        out.push('\n');
    }

    if !detail.plans.is_empty() {
        let _ = writeln!(out, "plans:");
        for plan in &detail.plans {
            let date = plan
                .date
                .day_in(zone)
                .map_or_else(|| date_label(&plan.date), |d| d.to_string());
            let _ = writeln!(out, "  {date}  {}", plan.note);
        }
    }
    out
}

fn render_stats(
    window: i64,
    summary: &WindowSummary,
    counts: &PresenceCounts,
    days: &[DailyCount],
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "last {window} days:");
    let _ = writeln!(out, "  stores visited:      {}", summary.visited);
    let _ = writeln!(out, "  with our presence:   {}", summary.ours);
    let _ = writeln!(out, "  with other presence: {}", summary.others);
    let _ = writeln!(out, "map: {}", format_counts(counts));
    for day in days {
        let _ = writeln!(out, "  {}  our {:>3}  other {:>3}", day.date, day.our, day.other);
    }
    out
}

/// Label for a date cell without a readable day.
fn date_label(date: &DateCell) -> String {
    if date.is_empty() {
        "undated".to_string()
    } else {
        format!("{date}?")
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use fieldmon_core::{Catalog, Flag, Ledger, Plan, Task, Visit};

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn store() -> Store {
        Catalog::parse("id,address,lat,lng,offices\n7,\"5 Market Sq\",55.0,37.0,\"ИП Максутов, Other Co\"\n")
            .stores()[0]
            .clone()
    }

    #[test]
    fn store_line_shows_state_and_offices() {
        let line = format_store_line(&store(), Presence::Our);
        assert_eq!(line, "     7  OUR      5 Market Sq  [ИП Максутов, Other Co]");
    }

    #[test]
    fn detail_lists_visits_task_and_plans() {
        let store = store();
        let zone = FixedOffset::east_opt(3 * 3600).unwrap();
        let ledger = Ledger {
            visits: vec![
                Visit {
                    observer: "anna".to_string(),
                    comment: "new shelf".to_string(),
                    our_presence: Flag::from(true),
                    ..Visit::new(store.id.clone(), day(3))
                },
                Visit {
                    store_id: Some(store.id.clone()),
                    observer: "anna".to_string(),
                    other_presence: Flag::from(true),
                    ..Visit::default()
                },
                Visit {
                    store_id: Some(store.id.clone()),
                    date: serde_json::from_str(r#""01.06.2025""#).unwrap(),
                    observer: "oleg".to_string(),
                    ..Visit::default()
                },
            ],
            tasks: vec![Task::new(store.id.clone(), "restock")],
            plans: vec![Plan {
                store_id: Some(store.id.clone()),
                date: DateCell::from_day(day(20)),
                note: "bring samples".to_string(),
                ..Plan::default()
            }],
            store_positions: Vec::new(),
        };

        let text = render_detail(&StoreDetail::build(&store, &ledger, &zone), &zone);
        assert!(text.starts_with("store 7: 5 Market Sq\n"));
        assert!(text.contains("open task: restock"));
        assert!(text.contains("last visit: our yes, other no"));
        assert!(text.contains("  2025-06-03  anna  our yes other no  \"new shelf\"\n"));
        assert!(text.contains("  undated  anna  our no other yes\n"));
        assert!(text.contains("  01.06.2025?  oleg  our no other no\n"));
        assert!(text.contains("  2025-06-20  bring samples"));
    }

    #[test]
    fn stats_render_includes_daily_rows_when_present() {
        let summary = WindowSummary {
            visited: 3,
            ours: 2,
            others: 1,
        };
        let counts = PresenceCounts {
            our: 4,
            other: 1,
            editing: 0,
            none: 10,
        };
        let days = vec![DailyCount {
            date: day(19),
            our: 2,
            other: 0,
        }];

        let text = render_stats(14, &summary, &counts, &days);
        assert!(text.contains("last 14 days:"));
        assert!(text.contains("stores visited:      3"));
        assert!(text.contains("map: our 4  other 1  editing 0  none 10"));
        assert!(text.contains("  2025-06-19  our   2  other   0"));
    }

    #[test]
    fn failed_write_becomes_an_error() {
        assert!(report_outcome(SaveOutcome { success: true }, "ok").is_ok());
        let err = report_outcome(SaveOutcome { success: false }, "visit recorded").unwrap_err();
        assert!(err.to_string().contains("kept in local cache"));
    }

    #[test]
    fn non_finite_coordinates_serialize_as_null() {
        assert_eq!(finite_or_null(f64::NAN), None);
        assert_eq!(finite_or_null(55.5), Some(55.5));
    }
}
