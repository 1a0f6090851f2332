//! Relevance labelling with optimistic concurrency
//!
//! A label operation reloads the current record set, checks that the
//! caller's version still matches, patches exactly one record and persists
//! the full set. A stale version is rejected without writing. Label
//! operations inside this process are serialised so the check and the write
//! cannot interleave; writers in other processes are not coordinated.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::export::{Gateway, PersistError};
use crate::loader::Loader;
use crate::record::{Column, Label, RecordSet, Version};

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("No data available")]
    NoData,

    #[error("Data changed since version {expected}; current version is {current}")]
    Conflict { expected: Version, current: Version },

    #[error("Failed to save label: {0}")]
    Persistence(#[from] PersistError),
}

/// Successful label call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// Label written; `version` identifies the persisted set
    Applied { version: Version },
    /// Nothing matched; the set was not written
    Skipped { notice: String, version: Version },
}

/// Why a patch could not be applied to a set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchMiss {
    NoIdColumn,
    UnknownId(i64),
}

impl PatchMiss {
    pub fn notice(&self) -> String {
        match self {
            PatchMiss::NoIdColumn => "Data has no Message ID column; nothing labelled".to_string(),
            PatchMiss::UnknownId(id) => format!("Message {} not found in current data", id),
        }
    }
}

/// New set with the first record matching `message_id` relabelled
///
/// Introduces the `Label` column when the set does not have it yet.
pub fn patch(set: &RecordSet, message_id: i64, label: Option<Label>) -> Result<RecordSet, PatchMiss> {
    if !set.schema.has(Column::MessageId) {
        return Err(PatchMiss::NoIdColumn);
    }
    let index = set
        .position(message_id)
        .ok_or(PatchMiss::UnknownId(message_id))?;

    let mut patched = set.clone();
    patched.records[index].label = label;
    patched.schema.insert(Column::Label);
    Ok(patched)
}

pub struct LabelMutator {
    loader: Arc<Loader>,
    gateway: Arc<Gateway>,
    write_lock: Mutex<()>,
}

impl LabelMutator {
    pub fn new(loader: Arc<Loader>, gateway: Arc<Gateway>) -> Self {
        Self {
            loader,
            gateway,
            write_lock: Mutex::new(()),
        }
    }

    /// Set (or clear, with `None`) the label of one record
    pub async fn apply_label(
        &self,
        message_id: i64,
        label: Option<Label>,
        expected: &Version,
    ) -> Result<LabelOutcome, LabelError> {
        let _guard = self.write_lock.lock().await;

        let current = self.loader.load().await;
        if current.is_empty() {
            return Err(LabelError::NoData);
        }
        let current_version = current.version.clone().ok_or(LabelError::NoData)?;

        if current_version != *expected {
            warn!(
                message_id,
                expected = %expected,
                current = %current_version,
                "Rejected label on stale version"
            );
            return Err(LabelError::Conflict {
                expected: expected.clone(),
                current: current_version,
            });
        }

        let patched = match patch(&current, message_id, label) {
            Ok(patched) => patched,
            Err(miss) => {
                warn!(message_id, reason = ?miss, "Label request matched no record");
                return Ok(LabelOutcome::Skipped {
                    notice: miss.notice(),
                    version: current_version,
                });
            }
        };

        let version = self.gateway.persist(&patched).await?;
        info!(
            message_id,
            label = ?label.map(Label::value),
            version = %version,
            "Applied label"
        );
        Ok(LabelOutcome::Applied { version })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::store::{BlobStore, FsBlobStore};
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

    struct Fixture {
        _tmp: TempDir,
        store: Arc<FsBlobStore>,
        mutator: LabelMutator,
        loader: Arc<Loader>,
    }

    async fn fixture(document: Value) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let config = EngineConfig {
            local_fallback_path: tmp.path().join("missing.json"),
            export_path: tmp.path().join("export.csv"),
            ..EngineConfig::default()
        };
        let store = Arc::new(FsBlobStore::new(tmp.path().join("blobs"), "monitoria-data"));
        store
            .put(
                "monitoria-data",
                "telegram_messages.json",
                serde_json::to_vec(&document).unwrap(),
                "application/json",
            )
            .await
            .unwrap();

        let loader = Arc::new(Loader::new(config.clone(), store.clone()).unwrap());
        let gateway = Arc::new(Gateway::new(config, store.clone()));
        Fixture {
            _tmp: tmp,
            store,
            mutator: LabelMutator::new(loader.clone(), gateway),
            loader,
        }
    }

    #[test]
    fn test_patch_introduces_label_column() {
        let data = set(json!([{"Message ID": 1}, {"Message ID": 2}]));
        assert!(!data.schema.has(Column::Label));

        let patched = patch(&data, 2, Some(Label::Relevant)).unwrap();
        assert!(patched.schema.has(Column::Label));
        assert_eq!(patched.records[0].label, None);
        assert_eq!(patched.records[1].label, Some(Label::Relevant));
    }

    #[test]
    fn test_patch_first_match_only() {
        let data = set(json!([{"Message ID": 5}, {"Message ID": 5}]));
        let patched = patch(&data, 5, Some(Label::NotRelevant)).unwrap();
        assert_eq!(patched.records[0].label, Some(Label::NotRelevant));
        assert_eq!(patched.records[1].label, None);
    }

    #[test]
    fn test_patch_misses() {
        let no_ids = set(json!([{"Title": "x"}]));
        assert_eq!(patch(&no_ids, 1, None).unwrap_err(), PatchMiss::NoIdColumn);

        let data = set(json!([{"Message ID": 1}]));
        assert_eq!(
            patch(&data, 9, Some(Label::Relevant)).unwrap_err(),
            PatchMiss::UnknownId(9)
        );
    }

    #[tokio::test]
    async fn test_apply_label_persists_and_returns_new_version() {
        let fx = fixture(json!({"messages": [{"Message ID": 1}, {"Message ID": 2, "Extra": 3}]})).await;
        let before = fx.loader.load().await;
        let version = before.version.clone().unwrap();

        let outcome = fx
            .mutator
            .apply_label(2, Some(Label::Relevant), &version)
            .await
            .unwrap();
        let LabelOutcome::Applied { version: new_version } = outcome else {
            panic!("expected Applied, got {:?}", outcome);
        };
        assert_ne!(new_version, version);

        let after = fx.loader.load().await;
        assert_eq!(after.version, Some(new_version));
        assert_eq!(after.records[1].label, Some(Label::Relevant));
        assert_eq!(after.records[1].passthrough("Extra"), Some(&json!(3)));
        assert_eq!(after.records[0].label, None);
    }

    #[tokio::test]
    async fn test_label_write_leaves_other_cells_byte_identical() {
        let fx = fixture(json!({"messages": [
            {"Message ID": 1, "Views": 120, "Score": "5"},
            {"Message ID": 2, "Views": 80, "Score": 3}
        ]}))
        .await;
        let version = fx.loader.load().await.version.unwrap();

        fx.mutator
            .apply_label(2, Some(Label::Relevant), &version)
            .await
            .unwrap();

        let stored = fx
            .store
            .get("telegram_messages.json")
            .await
            .unwrap();
        assert_eq!(
            String::from_utf8(stored).unwrap(),
            r#"{"messages":[{"Message ID":1,"Score":"5","Views":120},{"Message ID":2,"Score":3,"Views":80,"Label":1}]}"#
        );
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_without_writing() {
        let fx = fixture(json!({"messages": [{"Message ID": 1}]})).await;
        let original = fx.store.get("telegram_messages.json").await.unwrap();

        let stale = Version::from("deadbeef".to_string());
        let err = fx
            .mutator
            .apply_label(1, Some(Label::Relevant), &stale)
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::Conflict { .. }));
        assert_eq!(fx.store.get("telegram_messages.json").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_second_writer_with_old_version_loses() {
        let fx = fixture(json!({"messages": [{"Message ID": 1}, {"Message ID": 2}]})).await;
        let version = fx.loader.load().await.version.unwrap();

        fx.mutator
            .apply_label(1, Some(Label::Relevant), &version)
            .await
            .unwrap();
        let err = fx
            .mutator
            .apply_label(2, Some(Label::Relevant), &version)
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::Conflict { .. }));

        let after = fx.loader.load().await;
        assert_eq!(after.records[0].label, Some(Label::Relevant));
        assert_eq!(after.records[1].label, None);
    }

    #[tokio::test]
    async fn test_unknown_id_is_notice_not_error() {
        let fx = fixture(json!({"messages": [{"Message ID": 1}]})).await;
        let version = fx.loader.load().await.version.unwrap();
        let original = fx.store.get("telegram_messages.json").await.unwrap();

        let outcome = fx
            .mutator
            .apply_label(42, Some(Label::Relevant), &version)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            LabelOutcome::Skipped {
                notice: "Message 42 not found in current data".to_string(),
                version,
            }
        );
        assert_eq!(fx.store.get("telegram_messages.json").await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_no_data() {
        let fx = fixture(json!({"messages": []})).await;
        let err = fx
            .mutator
            .apply_label(1, Some(Label::Relevant), &Version::from("x".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, LabelError::NoData));
    }
}
