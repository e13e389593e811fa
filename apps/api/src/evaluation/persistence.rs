//! Durable storage for the evaluation log.
//!
//! The store hands the full ordered record list to a `RecordSink` after every
//! mutation. `JsonFileSink` rewrites one JSON document each time through a
//! sibling temp file and a rename, so the live document is either the old or
//! the new version, never a partial one. An incremental backend can replace it
//! behind the same trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::evaluation::models::EvaluationRecord;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Persistence timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Replaces the persisted state with `records`.
    async fn persist(&self, records: &[EvaluationRecord]) -> Result<(), PersistenceError>;

    /// Reads back whatever was last persisted. Missing storage is an empty log.
    async fn load(&self) -> Result<Vec<EvaluationRecord>, PersistenceError>;

    /// Moves unreadable persisted state out of the way so the next `persist`
    /// cannot overwrite it. Returns where it went, if anywhere.
    async fn quarantine(&self) -> Result<Option<PathBuf>, PersistenceError> {
        Ok(None)
    }
}

/// Writes the whole log as a pretty-printed JSON array to a single file.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<dir>/<file name><suffix>`, next to the live document.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "evaluations.json".into());
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }
}

#[async_trait]
impl RecordSink for JsonFileSink {
    async fn persist(&self, records: &[EvaluationRecord]) -> Result<(), PersistenceError> {
        let body = serde_json::to_vec_pretty(records)?;

        let temp_path = self.temp_path();

        // Write to temporary file first; the handle is closed at the end of this scope
        {
            let mut file = File::create(&temp_path).await?;
            let written = file.write_all(&body).await;
            let flushed = file.flush().await;
            written?;
            flushed?;
            file.sync_all().await?;
        }

        // Atomic rename over the live document
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(
            "Persisted {} evaluation records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn load(&self) -> Result<Vec<EvaluationRecord>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    "No evaluation log at {}, starting empty",
                    self.path.display()
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn quarantine(&self) -> Result<Option<PathBuf>, PersistenceError> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let target = self.sibling(&format!(".corrupt-{stamp}"));
        tokio::fs::rename(&self.path, &target).await?;

        warn!(
            "Moved unreadable evaluation log {} to {}",
            self.path.display(),
            target.display()
        );
        Ok(Some(target))
    }
}
