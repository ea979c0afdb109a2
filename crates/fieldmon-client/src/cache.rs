//! Local cache surviving across sessions.
//!
//! Each collection lives in its own JSON file so a damaged file costs only
//! that collection, and a damaged record only itself.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fieldmon_core::Ledger;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::GatewayError;

const VISITS_KEY: &str = "visits";
const TASKS_KEY: &str = "tasks";
const PLANS_KEY: &str = "plans";
const POSITIONS_KEY: &str = "store_positions";

#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads every collection independently; missing or unreadable ones are empty.
    pub async fn load(&self) -> Ledger {
        Ledger {
            visits: self.load_key(VISITS_KEY).await,
            tasks: self.load_key(TASKS_KEY).await,
            plans: self.load_key(PLANS_KEY).await,
            store_positions: self.load_key(POSITIONS_KEY).await,
        }
    }

    /// Writes all four collections, creating the cache directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Cache`] on file-system failure or
    /// [`GatewayError::Encode`] if a collection cannot be serialized.
    pub async fn store(&self, ledger: &Ledger) -> Result<(), GatewayError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| GatewayError::Cache {
                path: self.dir.display().to_string(),
                source: e,
            })?;

        self.store_key(VISITS_KEY, &ledger.visits).await?;
        self.store_key(TASKS_KEY, &ledger.tasks).await?;
        self.store_key(PLANS_KEY, &ledger.plans).await?;
        self.store_key(POSITIONS_KEY, &ledger.store_positions).await?;
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    async fn load_key<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache read failed; using empty {key}");
                return Vec::new();
            }
        };

        let entries: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cache entry unreadable; using empty {key}");
                return Vec::new();
            }
        };
        entries
            .into_iter()
            .filter_map(|entry| {
                serde_json::from_value(entry)
                    .map_err(|e| tracing::warn!(path = %path.display(), error = %e, "skipping unreadable cached {key} record"))
                    .ok()
            })
            .collect()
    }

    async fn store_key<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), GatewayError> {
        let path = self.path_for(key);
        let json = serde_json::to_vec(items).map_err(GatewayError::Encode)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| GatewayError::Cache {
                path: path.display().to_string(),
                source: e,
            })
    }
}
