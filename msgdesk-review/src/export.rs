//! Persistence and the relevant-subset export
//!
//! [`Gateway::persist`] writes the whole record set back to the canonical
//! object. [`Gateway::export_relevant`] always writes a local CSV of the
//! records labelled relevant and then mirrors it to the blob store when
//! the store is reachable. A failed mirror leaves the local file in place
//! and is reported as a partial success.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::record::{Label, RecordSet, Version};
use crate::store::{BlobStore, StoreError, Table, TableFormat};

/// Writing the canonical document failed
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode record set: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// The local export file could not be produced
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode export: {0}")]
    Encode(#[source] StoreError),

    #[error("failed to write {}: {source}", .path.display())]
    LocalWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a relevant-subset export
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No record is labelled relevant; nothing was written
    NothingToExport,
    /// Local file written, mirror skipped or failed
    LocalOnly { path: PathBuf, count: usize },
    /// Local file written and mirrored to the blob store
    Mirrored {
        path: PathBuf,
        key: String,
        count: usize,
    },
}

impl ExportOutcome {
    /// Human-readable summary for clients
    pub fn message(&self) -> String {
        match self {
            ExportOutcome::NothingToExport => "No relevant messages to export".to_string(),
            ExportOutcome::LocalOnly { path, count } => format!(
                "Exported {} relevant messages to {} (blob store mirror unavailable)",
                count,
                path.display()
            ),
            ExportOutcome::Mirrored { path, key, count } => format!(
                "Exported {} relevant messages to {} and mirrored to {}",
                count,
                path.display(),
                key
            ),
        }
    }
}

/// Records labelled relevant, in original order
pub fn relevant_subset(set: &RecordSet) -> RecordSet {
    let records = set
        .records
        .iter()
        .filter(|r| r.label == Some(Label::Relevant))
        .cloned()
        .collect();
    set.with_records(records)
}

/// Write side of the blob store for the record set and its exports
pub struct Gateway {
    config: EngineConfig,
    store: Arc<dyn BlobStore>,
}

impl Gateway {
    pub fn new(config: EngineConfig, store: Arc<dyn BlobStore>) -> Self {
        Self { config, store }
    }

    /// Replace the canonical object with `set`; returns the new version
    pub async fn persist(&self, set: &RecordSet) -> Result<Version, PersistError> {
        let bytes = set.to_document_bytes()?;
        let version = Version::of(&bytes);
        let key = &self.config.object_key;

        self.store
            .put(&self.config.bucket, key, bytes, "application/json")
            .await
            .map_err(|source| PersistError::Store {
                key: key.clone(),
                source,
            })?;

        info!(key = %key, records = set.len(), version = %version, "Persisted record set");
        Ok(version)
    }

    /// Export the relevant subset of `set`
    pub async fn export_relevant(&self, set: &RecordSet) -> Result<ExportOutcome, ExportError> {
        let relevant = relevant_subset(set);
        if relevant.is_empty() {
            return Ok(ExportOutcome::NothingToExport);
        }

        let count = relevant.len();
        let table = Table::from_record_set(&relevant);
        let bytes = table.to_csv().map_err(ExportError::Encode)?;

        let path = self.config.export_path.clone();
        write_atomic(&path, &bytes)
            .await
            .map_err(|source| ExportError::LocalWrite {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), count, "Wrote relevant export");

        if !self.store.check_connection().await {
            warn!("Blob store unreachable, export kept locally only");
            return Ok(ExportOutcome::LocalOnly { path, count });
        }

        let key = self.config.export_key.clone();
        match self.store.upload_table(&table, &key, TableFormat::Csv).await {
            Ok(()) => {
                info!(key = %key, count, "Mirrored relevant export");
                Ok(ExportOutcome::Mirrored { path, key, count })
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Export mirror failed, export kept locally only");
                Ok(ExportOutcome::LocalOnly { path, count })
            }
        }
    }
}

/// Write via a sibling temporary file and rename into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsBlobStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn set(rows: Value) -> RecordSet {
        let rows = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r.as_object().unwrap().clone())
            .collect();
        RecordSet::from_rows(rows)
    }

    fn config(tmp: &TempDir) -> EngineConfig {
        EngineConfig {
            local_fallback_path: tmp.path().join("local.json"),
            export_path: tmp.path().join("out").join("relevant.csv"),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_relevant_subset() {
        let data = set(json!([
            {"Message ID": 1, "Label": 1},
            {"Message ID": 2, "Label": 0},
            {"Message ID": 3},
            {"Message ID": 4, "Label": "1"}
        ]));
        let ids: Vec<_> = relevant_subset(&data)
            .records
            .iter()
            .filter_map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[tokio::test]
    async fn test_persist_returns_digest_of_written_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsBlobStore::new(tmp.path().join("blobs"), "monitoria-data"));
        let gateway = Gateway::new(config(&tmp), store.clone());

        let data = set(json!([{"Message ID": 1, "Extra": "kept"}]));
        let version = gateway.persist(&data).await.unwrap();

        let written = store.get("telegram_messages.json").await.unwrap();
        assert_eq!(version, Version::of(&written));

        let reloaded = store.load_json("telegram_messages.json").await.unwrap();
        assert_eq!(reloaded.records, data.records);
        assert_eq!(reloaded.version, Some(version));
    }

    #[tokio::test]
    async fn test_export_nothing_relevant() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsBlobStore::new(tmp.path().join("blobs"), "monitoria-data"));
        let cfg = config(&tmp);
        let gateway = Gateway::new(cfg.clone(), store);

        let data = set(json!([{"Message ID": 1, "Label": 0}]));
        let outcome = gateway.export_relevant(&data).await.unwrap();
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(!cfg.export_path.exists());
    }

    #[tokio::test]
    async fn test_export_writes_local_and_mirrors() {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(FsBlobStore::new(tmp.path().join("blobs"), "monitoria-data"));
        let cfg = config(&tmp);
        let gateway = Gateway::new(cfg.clone(), store.clone());

        let data = set(json!([
            {"Message ID": 1, "Title": "A", "Label": 1},
            {"Message ID": 2, "Title": "B", "Label": 0}
        ]));
        let outcome = gateway.export_relevant(&data).await.unwrap();
        assert!(matches!(outcome, ExportOutcome::Mirrored { count: 1, .. }));

        let local = std::fs::read_to_string(&cfg.export_path).unwrap();
        assert_eq!(local, "Message ID,Title,Label\n1,A,1\n");

        let mirrored = store.get("telegram_messages_relevant.csv").await.unwrap();
        assert_eq!(mirrored, local.into_bytes());
    }

    #[tokio::test]
    async fn test_export_local_only_when_store_unreachable() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let store = Arc::new(FsBlobStore::new(&blocker, "monitoria-data"));
        let cfg = config(&tmp);
        let gateway = Gateway::new(cfg.clone(), store);

        let data = set(json!([{"Message ID": 1, "Label": 1}]));
        let outcome = gateway.export_relevant(&data).await.unwrap();

        assert!(matches!(outcome, ExportOutcome::LocalOnly { count: 1, .. }));
        assert!(cfg.export_path.exists());
        assert!(outcome.message().contains("mirror unavailable"));
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let gateway = Gateway::new(
            config(&tmp),
            Arc::new(FsBlobStore::new(&blocker, "monitoria-data")),
        );

        let data = set(json!([{"Message ID": 1}]));
        assert!(matches!(
            gateway.persist(&data).await,
            Err(PersistError::Store { .. })
        ));
    }
}
