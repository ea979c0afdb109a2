use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::FixedOffset;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// JSON document the backing store service reads and writes.
    pub data_file: PathBuf,
    /// Directory of static assets served by the backing store service.
    pub public_dir: PathBuf,
    /// Full URL of the ledger endpoint (`GET`/`POST`).
    pub remote_url: String,
    pub api_token: Option<String>,
    /// Post the ledger as `text/plain` for endpoints that reject custom content types.
    pub remote_plain_text: bool,
    /// `None` leaves the transport default in place (no timeout).
    pub request_timeout_secs: Option<u64>,
    pub cache_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub our_office_token: String,
    /// Recency window in days, at most one year.
    pub window_days: i64,
    /// Zone in which visit timestamps become calendar days.
    pub utc_offset: FixedOffset,
    pub poll_interval_secs: u64,
    pub default_observer: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("data_file", &self.data_file)
            .field("public_dir", &self.public_dir)
            .field("remote_url", &self.remote_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("remote_plain_text", &self.remote_plain_text)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("cache_dir", &self.cache_dir)
            .field("catalog_path", &self.catalog_path)
            .field("our_office_token", &self.our_office_token)
            .field("window_days", &self.window_days)
            .field("utc_offset", &self.utc_offset)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("default_observer", &self.default_observer)
            .finish()
    }
}
