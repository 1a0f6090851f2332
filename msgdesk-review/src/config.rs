//! Bootstrap configuration for msgdesk-review
//!
//! Read once at startup from TOML (see `msgdesk_common::config` for file
//! resolution). Every field has a compiled default, so an empty or missing
//! file yields a working local setup. Command-line flags override the
//! file after loading.

use msgdesk_common::config::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::store::StoreConfig;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Allowed CORS origins; empty allows any origin
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5001,
            cors_origins: Vec::new(),
        }
    }
}

/// Where the record set comes from and where exports go
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bucket holding the canonical document and the export mirror
    pub bucket: String,
    /// Object key of the canonical `{"messages": [...]}` document
    pub object_key: String,
    /// Last-resort local copy of the document
    pub local_fallback_path: PathBuf,
    /// Upper bound on a single remote fetch, in seconds
    pub load_timeout_secs: u64,
    /// Public read URL tried before the blob store; skipped when unset
    pub public_url: Option<String>,
    /// Local CSV written by the relevant-subset export
    pub export_path: PathBuf,
    /// Object key the export is mirrored to
    pub export_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket: "monitoria-data".to_string(),
            object_key: "telegram_messages.json".to_string(),
            local_fallback_path: PathBuf::from("telegram_messages.json"),
            load_timeout_secs: 30,
            public_url: None,
            export_path: PathBuf::from("telegram_messages_relevant.csv"),
            export_key: "telegram_messages_relevant.csv".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }

    /// Lowercased file stem of the canonical object key, used to pick the
    /// right listing entry when the exact key is missing
    pub fn candidate_token(&self) -> String {
        let stem = self
            .object_key
            .rsplit_once('.')
            .map_or(self.object_key.as_str(), |(stem, _)| stem);
        stem.to_lowercase()
    }
}

/// Access control for the `/api` surface
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// When false every route is open (local single-user mode)
    pub enabled: bool,
    /// Lifetime of issued bearer tokens
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_ttl_secs: 12 * 60 * 60,
        }
    }
}
