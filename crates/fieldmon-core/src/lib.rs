pub mod app_config;
pub mod catalog;
pub mod cell;
pub mod config;
pub mod ledger;
mod lenient;
pub mod presence;
pub mod report;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{load_catalog, parse_catalog, split_quoted_line, Catalog, Store};
pub use config::{load_app_config, load_app_config_from_env};
pub use cell::{DateCell, Flag};
pub use ledger::{
    appended_visit, empty_document, fill_missing_collections, merge_collections, Ledger,
    PatchError, APPEND_VISIT_ACTION, COLLECTION_KEYS,
};
pub use presence::{days_since, is_within_window, Presence, PresencePolicy, StorePresence};
pub use report::{daily_breakdown, presence_counts, DailyCount, PresenceCounts, StoreDetail, WindowSummary};
pub use types::{Plan, StoreId, StorePosition, Task, Visit};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read store catalog {path}: {source}")]
    CatalogFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
