//! Builds a hydrated [`FieldSession`] from configuration.

use fieldmon_client::{FieldSession, HydrateSource, LedgerClient, LocalCache};
use fieldmon_core::{AppConfig, Catalog, PresencePolicy};

/// Loads the catalog, wires the gateway and hydrates the ledger.
///
/// A missing catalog is not fatal: the session starts with no stores and a
/// warning. Hydration never fails; when the remote is down the cache is used
/// and a notice is printed.
///
/// # Errors
///
/// Returns an error only if the ledger endpoint URL is invalid.
pub(crate) async fn open_session(config: &AppConfig) -> anyhow::Result<FieldSession> {
    let catalog = fieldmon_core::load_catalog(&config.catalog_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "store catalog unavailable; continuing without stores");
        Catalog::default()
    });

    let client = LedgerClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build ledger client: {e}"))?;
    let mut session = FieldSession::new(
        catalog,
        PresencePolicy::from_config(config),
        client,
        LocalCache::new(config.cache_dir.clone()),
    );

    if session.hydrate().await == HydrateSource::Cache {
        eprintln!("notice: ledger endpoint unreachable; showing locally cached data");
    }

    Ok(session)
}
