//! Session state store configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location of the embedded SQLite database holding per-session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite file. Parent directories are created on open.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    /// sqlx connection URL for the configured path.
    pub fn connection_url(&self) -> String {
        sqlite_url(&self.path)
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/tidepool-sessions.sqlite")
}

/// sqlx sqlite URL format: `sqlite://relative/path.db` or `sqlite:/abs/path.db`.
pub fn sqlite_url(path: &Path) -> String {
    if path.is_absolute() {
        format!("sqlite:{}", path.display())
    } else {
        format!("sqlite://{}", path.display())
    }
}
