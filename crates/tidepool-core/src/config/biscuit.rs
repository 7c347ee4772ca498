//! Biscuit token configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for Biscuit session tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiscuitConfig {
    /// Environment variable containing the public key (hex-encoded).
    #[serde(default = "default_public_key_env")]
    pub public_key_env: String,

    /// Path to the public key file.
    #[serde(default)]
    pub public_key_file: Option<PathBuf>,

    /// Environment variable containing the private key (hex-encoded).
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,

    /// Path to the private key file.
    #[serde(default)]
    pub private_key_file: Option<PathBuf>,

    /// Lifetime of newly minted session tokens (e.g., "30d", "24h").
    #[serde(default = "default_token_ttl")]
    pub token_ttl: String,
}

impl Default for BiscuitConfig {
    fn default() -> Self {
        Self {
            public_key_env: default_public_key_env(),
            public_key_file: None,
            private_key_env: default_private_key_env(),
            private_key_file: None,
            token_ttl: default_token_ttl(),
        }
    }
}

impl BiscuitConfig {
    /// Resolve the public key from environment or file.
    pub fn resolve_public_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve_key(&self.public_key_env, self.public_key_file.as_ref())
    }

    /// Resolve the private key from environment or file.
    pub fn resolve_private_key(&self) -> Result<Option<String>, std::io::Error> {
        resolve_key(&self.private_key_env, self.private_key_file.as_ref())
    }
}

fn resolve_key(env_var: &str, file: Option<&PathBuf>) -> Result<Option<String>, std::io::Error> {
    // Try environment variable first
    if let Ok(key) = std::env::var(env_var)
        && !key.trim().is_empty()
    {
        return Ok(Some(key.trim().to_string()));
    }

    // Try file path
    if let Some(path) = file
        && path.exists()
    {
        let key = std::fs::read_to_string(path)?;
        return Ok(Some(key.trim().to_string()));
    }

    Ok(None)
}

fn default_public_key_env() -> String {
    "BISCUIT_PUBLIC_KEY".to_string()
}

fn default_private_key_env() -> String {
    "BISCUIT_PRIVATE_KEY".to_string()
}

fn default_token_ttl() -> String {
    "24h".to_string()
}
