//! Configuration types for the Tidepool MCP server.
//!
//! Configuration is loaded from a YAML file (`tidepool.yaml`) into a single
//! [`TidepoolConfig`] structure. Secrets (keys, default credentials) are
//! normally referenced through environment variables rather than inlined.
//!
//! # Sections
//!
//! - **mcp**: transport selection and HTTP bind address
//! - **store**: location of the embedded session state database
//! - **backend**: REST backend settings and deployment-wide default credentials
//! - **biscuit**: key material used to sign and verify session tokens

pub mod backend;
pub mod biscuit;
pub mod mcp;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub use backend::{BackendConfig, DefaultCredentials, ResolvedCredentials};
pub use biscuit::BiscuitConfig;
pub use mcp::{McpConfig, Transport};
pub use store::StoreConfig;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for [`TidepoolConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Complete Tidepool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TidepoolConfig {
    /// MCP server configuration.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Session state store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Backend database client configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Biscuit token configuration.
    #[serde(default)]
    pub biscuit: BiscuitConfig,
}

impl TidepoolConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Load configuration from a file if it exists, falling back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(config = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }
}
