//! Directory-backed blob store

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{BlobStore, StoreError};

/// Objects live at `<root>/<bucket>/<key>`
///
/// Writes go to a hidden temporary file first and are renamed into place,
/// so readers never observe a half-written object.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        validate_segment(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        validate_segment(key)?;
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

/// Keys are flat names: no separators, no parent references, no hidden files
fn validate_segment(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(StoreError::InvalidKey(name.to_string()));
    }
    Ok(())
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn check_connection(&self) -> bool {
        let dir = match self.bucket_dir(&self.bucket) {
            Ok(dir) => dir,
            Err(_) => return false,
        };
        match tokio::fs::create_dir_all(&dir).await {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "Blob directory unavailable");
                false
            }
        }
    }

    async fn list_files(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.bucket_dir(&self.bucket)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Unavailable(format!(
                    "bucket directory {} does not exist",
                    dir.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(&self.bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        let dir = self.bucket_dir(bucket)?;
        tokio::fs::create_dir_all(&dir).await?;

        let staging = dir.join(format!(".{}.tmp", key));
        tokio::fs::write(&staging, &body).await?;
        tokio::fs::rename(&staging, &path).await?;

        debug!(bucket, key, bytes = body.len(), "Stored object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Table, TableFormat};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_list() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "bucket");

        assert!(store.check_connection().await);
        store
            .put("bucket", "b.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put("bucket", "a.csv", b"x\n".to_vec(), "text/csv")
            .await
            .unwrap();

        assert_eq!(store.get("b.json").await.unwrap(), b"{}".to_vec());
        assert_eq!(
            store.list_files().await.unwrap(),
            vec!["a.csv".to_string(), "b.json".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "bucket");
        assert!(matches!(
            store.get("nope.json").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "bucket");
        assert!(matches!(
            store.get("../secret").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("bucket", ".hidden", vec![], "text/plain").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_root() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();

        let store = FsBlobStore::new(&file, "bucket");
        assert!(!store.check_connection().await);
        assert!(store.list_files().await.is_err());
    }

    #[tokio::test]
    async fn test_upload_table_then_load_csv() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "bucket");

        let table = Table::from_csv(b"Message ID,Label\n5,1\n").unwrap();
        store
            .upload_table(&table, "out.csv", TableFormat::Csv)
            .await
            .unwrap();

        let set = store.load_csv("out.csv").await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.records[0].message_id, Some(5));
        assert!(set.version.is_some());
    }
}
