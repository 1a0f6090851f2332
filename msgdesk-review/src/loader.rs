//! Record set loading with a three-step fallback chain
//!
//! 1. Public URL: one HTTP GET of the canonical document (skipped when no
//!    URL is configured)
//! 2. Blob store: connectivity probe, listing, candidate selection, load
//! 3. Local file: the fallback copy on disk
//!
//! The first path that yields a non-empty set wins. A failing path is
//! logged and the next one tried; when all fail the result is an empty
//! set, never an error.

use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::record::{DocumentError, RecordSet};
use crate::store::{BlobStore, StoreError};

/// Why a single load path produced nothing usable
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no public URL configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("public URL returned status {0}")]
    Status(u16),

    #[error("blob store unreachable")]
    Unreachable,

    #[error("no candidate file in bucket listing")]
    NoCandidate,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source contains no records")]
    Empty,
}

/// Produces the current record set from the best available source
pub struct Loader {
    config: EngineConfig,
    store: Arc<dyn BlobStore>,
    http: Client,
}

impl Loader {
    pub fn new(config: EngineConfig, store: Arc<dyn BlobStore>) -> Result<Self, LoadError> {
        let http = Client::builder().timeout(config.load_timeout()).build()?;
        Ok(Self {
            config,
            store,
            http,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Load the record set; an empty set means every source failed
    pub async fn load(&self) -> RecordSet {
        match self.load_public().await {
            Ok(set) => return set,
            Err(LoadError::NotConfigured) => debug!("Public URL not configured, skipping"),
            Err(e) => warn!(error = %e, "Public URL load failed"),
        }

        match self.load_from_store().await {
            Ok(set) => return set,
            Err(e) => warn!(error = %e, "Blob store load failed"),
        }

        match self.load_local().await {
            Ok(set) => return set,
            Err(e) => warn!(
                path = %self.config.local_fallback_path.display(),
                error = %e,
                "Local fallback load failed"
            ),
        }

        warn!("All load paths failed, continuing with an empty record set");
        RecordSet::default()
    }

    async fn load_public(&self) -> Result<RecordSet, LoadError> {
        let url = self
            .config
            .public_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(LoadError::NotConfigured)?;

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(LoadError::Status(resp.status().as_u16()));
        }
        let bytes = resp.bytes().await?;
        let set = non_empty(RecordSet::from_document_bytes(&bytes)?)?;

        info!(records = set.len(), "Loaded record set from public URL");
        Ok(set)
    }

    async fn load_from_store(&self) -> Result<RecordSet, LoadError> {
        if !self.store.check_connection().await {
            return Err(LoadError::Unreachable);
        }

        let files = self.store.list_files().await?;
        let candidate = select_candidate(
            &files,
            &self.config.object_key,
            &self.config.candidate_token(),
            &self.config.export_key,
        )
        .ok_or(LoadError::NoCandidate)?;

        let set = if is_csv(&candidate) {
            self.store.load_csv(&candidate).await?
        } else {
            self.store.load_json(&candidate).await?
        };
        let set = non_empty(set)?;

        info!(
            bucket = self.store.bucket(),
            key = %candidate,
            records = set.len(),
            "Loaded record set from blob store"
        );
        Ok(set)
    }

    async fn load_local(&self) -> Result<RecordSet, LoadError> {
        let path = &self.config.local_fallback_path;
        let bytes = tokio::fs::read(path).await?;
        let set = non_empty(RecordSet::from_document_bytes(&bytes)?)?;

        info!(path = %path.display(), records = set.len(), "Loaded record set from local file");
        Ok(set)
    }
}

fn non_empty(set: RecordSet) -> Result<RecordSet, LoadError> {
    if set.is_empty() {
        Err(LoadError::Empty)
    } else {
        Ok(set)
    }
}

fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

/// Pick the object to load from a bucket listing
///
/// The exact object key wins. Otherwise only names containing `token`
/// qualify, the first `.json` before the first `.csv`. The export object
/// is never a candidate.
pub fn select_candidate(files: &[String], object_key: &str, token: &str, exclude: &str) -> Option<String> {
    let eligible: Vec<&String> = files.iter().filter(|f| f.as_str() != exclude).collect();

    if let Some(exact) = eligible.iter().find(|f| f.as_str() == object_key) {
        return Some((*exact).clone());
    }

    let token = token.to_lowercase();
    let with_token = |ext: &str| {
        eligible.iter().find(|f| {
            let lower = f.to_lowercase();
            lower.ends_with(ext) && lower.contains(&token)
        })
    };

    with_token(".json")
        .or_else(|| with_token(".csv"))
        .map(|f| (*f).clone())
}
