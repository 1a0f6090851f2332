//! Blob store seam
//!
//! The durable record set lives as one object in a key/value blob store.
//! Everything the engine needs from storage goes through [`BlobStore`];
//! every call is fallible and callers always have a local degradation path.

mod fs;
mod http;

pub use fs::FsBlobStore;
pub use http::HttpBlobStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::record::{DocumentError, RecordSet, Version};

/// Blob store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Serialisation used when uploading a [`Table`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Json,
}

impl TableFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            TableFormat::Csv => "text/csv",
            TableFormat::Json => "application/json",
        }
    }
}

/// Tabular view of records: ordered column names plus one object per row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    pub fn from_record_set(set: &RecordSet) -> Self {
        Self {
            columns: set.column_names(),
            rows: set.records.iter().map(|r| r.to_json()).collect(),
        }
    }

    /// Encode as CSV with a header row; missing and null cells are empty
    pub fn to_csv(&self) -> Result<Vec<u8>, StoreError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;

        for row in &self.rows {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|column| csv_cell(row.get(column)))
                .collect();
            writer.write_record(&cells)?;
        }

        writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))
    }

    /// Decode CSV with a header row; empty cells become null
    pub fn from_csv(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;
            let row: Map<String, Value> = columns
                .iter()
                .zip(record.iter())
                .map(|(column, cell)| {
                    let value = if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_string())
                    };
                    (column.clone(), value)
                })
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Encode as a persisted `{"messages": [...]}` document
    pub fn to_json_document(&self) -> Result<Vec<u8>, serde_json::Error> {
        #[derive(Serialize)]
        struct Document<'a> {
            messages: &'a [Map<String, Value>],
        }
        serde_json::to_vec(&Document {
            messages: &self.rows,
        })
    }
}

fn csv_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Key/value object storage used for the canonical record set and exports
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Bucket that `list_files`, `get` and the provided helpers operate on
    fn bucket(&self) -> &str;

    /// Cheap reachability probe; never errors
    async fn check_connection(&self) -> bool;

    /// Object names in the bucket, sorted
    async fn list_files(&self) -> Result<Vec<String>, StoreError>;

    /// Raw bytes of one object
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write (or replace) one object
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Load a `{"messages": [...]}` object; the version is its digest
    async fn load_json(&self, name: &str) -> Result<RecordSet, StoreError> {
        let bytes = self.get(name).await?;
        Ok(RecordSet::from_document_bytes(&bytes)?)
    }

    /// Load a CSV object as a record set; the version is its digest
    async fn load_csv(&self, name: &str) -> Result<RecordSet, StoreError> {
        let bytes = self.get(name).await?;
        let table = Table::from_csv(&bytes)?;
        let mut set = RecordSet::from_rows(table.rows);
        set.version = Some(Version::of(&bytes));
        Ok(set)
    }

    /// Encode and write a table to this store's bucket
    async fn upload_table(
        &self,
        table: &Table,
        name: &str,
        format: TableFormat,
    ) -> Result<(), StoreError> {
        let body = match format {
            TableFormat::Csv => table.to_csv()?,
            TableFormat::Json => table
                .to_json_document()
                .map_err(|e| StoreError::Document(DocumentError::Json(e)))?,
        };
        self.put(self.bucket(), name, body, format.content_type())
            .await
    }
}

/// Which blob store backend to construct
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Directory-backed store: objects live at `<root>/<bucket>/<key>`
    Fs { root: PathBuf },
    /// S3-compatible path-style HTTP endpoint
    Http {
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Fs {
            root: PathBuf::from("data"),
        }
    }
}

impl StoreConfig {
    /// Construct the configured backend for `bucket`
    pub fn build(&self, bucket: &str, timeout: Duration) -> Result<Arc<dyn BlobStore>, StoreError> {
        Ok(match self {
            StoreConfig::Fs { root } => Arc::new(FsBlobStore::new(root.clone(), bucket)),
            StoreConfig::Http { endpoint, token } => Arc::new(HttpBlobStore::new(
                endpoint,
                bucket,
                token.clone(),
                timeout,
            )?),
        })
    }
}
