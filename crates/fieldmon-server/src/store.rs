//! File-backed ledger document.
//!
//! The whole ledger lives in one pretty-printed JSON file, kept as raw JSON:
//! the store never decodes records, so whatever a client wrote is served
//! back unchanged. Writes go through a process-wide async mutex so
//! read-merge-write cycles never interleave; clients still race each other
//! and the last full write wins.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use fieldmon_core::{empty_document, fill_missing_collections, merge_collections, PatchError};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const VISIT_LOG_SUFFIX: &str = "visits.log.jsonl";

pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("data file {path} is not a ledger document: {reason}")]
    Corrupt { path: String, reason: String },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("failed to encode ledger document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One line of the append-only visit log.
#[derive(Debug, Serialize)]
struct VisitLogEntry<'a> {
    logged_at: chrono::DateTime<Utc>,
    visit: &'a Document,
}

#[derive(Debug)]
pub struct DocumentStore {
    path: PathBuf,
    visit_log: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let visit_log = visit_log_path(&path);
        Self {
            path,
            visit_log,
            write_lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    fn visit_log(&self) -> &Path {
        &self.visit_log
    }

    /// Writes an empty document when the data file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be inspected or created.
    pub async fn ensure_initialized(&self) -> Result<(), StoreError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| self.io_error(e))?;
                }
                self.write(&empty_document()).await?;
                tracing::info!(path = %self.path.display(), "initialized empty data file");
                Ok(())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Current document, with an empty array for every missing collection.
    /// A missing file reads as the empty document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read and
    /// [`StoreError::Corrupt`] if it is not a JSON object.
    pub async fn read(&self) -> Result<Document, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(empty_document()),
            Err(e) => return Err(self.io_error(e)),
        };
        let mut document = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(document)) => document,
            Ok(other) => {
                return Err(self.corrupt(format!("top level is {}", json_kind(&other))));
            }
            Err(e) => return Err(self.corrupt(e.to_string())),
        };
        fill_missing_collections(&mut document);
        Ok(document)
    }

    /// Replaces every collection present in `patch` and writes the result.
    ///
    /// The existing file must be readable: a document that cannot be parsed
    /// is left on disk untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Patch`] for a malformed collection, the error
    /// from [`DocumentStore::read`], or [`StoreError::Io`] if the merged
    /// document cannot be written.
    pub async fn merge(&self, patch: &Document) -> Result<Document, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read().await?;
        merge_collections(&mut current, patch)?;
        self.write(&current).await?;
        Ok(current)
    }

    /// Appends one raw visit to the log next to the data file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the log cannot be opened or written.
    pub async fn append_visit(&self, visit: &Document) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(&VisitLogEntry {
            logged_at: Utc::now(),
            visit,
        })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.visit_log)
            .await
            .map_err(|e| self.log_error(e))?;
        file.write_all(&line).await.map_err(|e| self.log_error(e))?;
        file.flush().await.map_err(|e| self.log_error(e))
    }

    async fn write(&self, document: &Document) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn corrupt(&self, reason: String) -> StoreError {
        StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason,
        }
    }

    fn log_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.visit_log.display().to_string(),
            source,
        }
    }
}

/// Length of each collection, for logging.
pub fn collection_sizes(document: &Document) -> [(&'static str, usize); 4] {
    fieldmon_core::COLLECTION_KEYS.map(|key| {
        let len = document.get(key).and_then(Value::as_array).map_or(0, Vec::len);
        (key, len)
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn visit_log_path(data_file: &Path) -> PathBuf {
    let stem = data_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    data_file.with_file_name(format!("{stem}.{VISIT_LOG_SUFFIX}"))
}
