//! Serve command for starting the Tidepool MCP server.
//!
//! `tidepool serve` - Run the server on stdio or HTTP.

use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tidepool_backend::RestClientFactory;
use tidepool_biscuit::TokenVerifier;
use tidepool_core::{TidepoolConfig, Transport};
use tidepool_mcp::{McpServer, SessionManager, SqliteSessionStore};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub transport: Option<Transport>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub session: Option<String>,
    pub store: Option<PathBuf>,
}

impl ServeOverrides {
    fn apply(self, config: &mut TidepoolConfig) {
        if let Some(transport) = self.transport {
            config.mcp.transport = transport;
        }
        if let Some(host) = self.host {
            config.mcp.host = host;
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        if let Some(session) = self.session {
            config.mcp.session_id = session;
        }
        if let Some(store) = self.store {
            config.store.path = store;
        }
    }
}

/// Start the MCP server and run until the transport stops.
pub async fn run(mut config: TidepoolConfig, overrides: ServeOverrides) -> anyhow::Result<()> {
    overrides.apply(&mut config);

    // Fail before opening anything if HTTP has no way to verify tokens.
    let verifier = if config.mcp.is_http() {
        Some(load_verifier(&config)?)
    } else {
        None
    };

    let store = SqliteSessionStore::open(&config.store)
        .await
        .with_context(|| format!("Failed to open session store at {}", config.store.path.display()))?;
    let clients =
        RestClientFactory::new(&config.backend).context("Failed to build backend HTTP client")?;

    let defaults = config.backend.defaults.resolve();
    if let Some(defaults) = &defaults {
        tracing::info!(
            endpoint_url = %defaults.endpoint_url,
            "Default backend credentials found; new sessions start configured"
        );
    }

    let sessions = SessionManager::new(Arc::new(store), Arc::new(clients)).with_defaults(defaults);
    let server = McpServer::new(Arc::new(sessions));

    match verifier {
        Some(verifier) => server.run_http(&config.mcp.bind_address(), verifier).await?,
        None => server.run_stdio(&config.mcp.session_id).await?,
    }
    Ok(())
}

fn load_verifier(config: &TidepoolConfig) -> anyhow::Result<TokenVerifier> {
    let hex = config
        .biscuit
        .resolve_public_key()
        .context("Failed to read the Biscuit public key")?
        .with_context(|| {
            format!(
                "HTTP transport needs a public key: set {} or biscuit.public_key_file",
                config.biscuit.public_key_env
            )
        })?;
    let public_key = tidepool_biscuit::keys::load_public_key_hex(&hex)?;
    Ok(TokenVerifier::new(public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tidepool_biscuit::KeyPair;

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = TidepoolConfig::from_yaml(
            "mcp:\n  transport: stdio\n  port: 3000\n  session_id: file-session\n",
        )
        .unwrap();

        ServeOverrides {
            transport: Some(Transport::Http),
            port: Some(8080),
            ..Default::default()
        }
        .apply(&mut config);

        assert!(config.mcp.is_http());
        assert_eq!(config.mcp.port, 8080);
        assert_eq!(config.mcp.session_id, "file-session");
    }

    #[test]
    fn test_load_verifier_from_file() {
        let dir = tempdir().unwrap();
        let keypair = KeyPair::generate().unwrap();
        let (_, public_path) = keypair.save_to_dir(dir.path()).unwrap();

        let mut config = TidepoolConfig::default();
        config.biscuit.public_key_env = "TIDEPOOL_TEST_UNSET_PUBLIC_KEY_53D0".to_string();
        config.biscuit.public_key_file = Some(public_path);
        assert!(load_verifier(&config).is_ok());

        config.biscuit.public_key_file = Some(dir.path().join("missing.key"));
        assert!(load_verifier(&config).is_err());
    }

    #[test]
    fn test_load_verifier_requires_key() {
        let mut config = TidepoolConfig::default();
        config.biscuit.public_key_env = "TIDEPOOL_TEST_UNSET_PUBLIC_KEY_53D0".to_string();
        let err = load_verifier(&config).unwrap_err();
        assert!(err.to_string().contains("HTTP transport needs a public key"));
    }
}
