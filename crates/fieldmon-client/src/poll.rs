use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use fieldmon_core::StorePresence;
use tokio::time::MissedTickBehavior;

use crate::session::FieldSession;

/// Refreshes `session` every `interval` until `shutdown` resolves.
///
/// Each tick re-reads visits, tasks and plans, recomputes the presence of
/// every catalog store for `today()`, and hands the result to `on_refresh`.
/// A failed refresh is logged and retried on the next tick with no backoff;
/// the callback still runs against the state already in memory.
///
/// The first refresh happens one full interval after the call, since the
/// session is expected to have been hydrated already. Returns the number of
/// successful refreshes.
pub async fn poll_until<T, S, F>(
    session: &mut FieldSession,
    interval: Duration,
    today: T,
    shutdown: S,
    mut on_refresh: F,
) -> usize
where
    T: Fn() -> NaiveDate,
    S: Future<Output = ()>,
    F: FnMut(&FieldSession, &[StorePresence]),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    tokio::pin!(shutdown);
    let mut refreshed = 0usize;

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                match session.refresh().await {
                    Ok(()) => refreshed += 1,
                    Err(e) => tracing::warn!(error = %e, "poll refresh failed; keeping current ledger"),
                }
                let states = session.presence_map(today());
                on_refresh(session, &states);
            }
        }
    }

    tracing::debug!(refreshed, "polling stopped");
    refreshed
}
