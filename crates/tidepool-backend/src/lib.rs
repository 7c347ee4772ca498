//! # tidepool-backend
//!
//! Backend database client used by the Tidepool session tools.
//!
//! Clients are never cached: a session's credentials may change between two
//! tool calls, so every tool invocation asks the [`ClientFactory`] for a fresh
//! handle built from the credentials it just read. Construction is cheap and
//! performs no network I/O; the first request happens when a query method is
//! called.
//!
//! ```ignore
//! use tidepool_backend::{ClientFactory, RestClientFactory};
//!
//! let factory = RestClientFactory::new(&backend_config)?;
//! let client = factory.create_client("https://db.example.com", "anon-key")?;
//! let tables = client.list_tables().await?;
//! ```

pub mod error;
pub mod rest;

use async_trait::async_trait;
use serde_json::Value;

pub use error::ClientError;
pub use rest::{RestClient, RestClientFactory};

/// A handle to the backend database.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Run the table introspection query and return its raw JSON result.
    ///
    /// The shape of the result is not checked here; callers validate it.
    async fn list_tables(&self) -> Result<Value, ClientError>;
}

/// Builds [`BackendClient`] handles from explicit credentials.
pub trait ClientFactory: Send + Sync {
    /// Build a client authenticated with the anonymous (public) key.
    fn create_client(&self, endpoint_url: &str, key: &str)
    -> Result<Box<dyn BackendClient>, ClientError>;

    /// Build a client authenticated with the privileged service key.
    fn create_service_client(
        &self,
        endpoint_url: &str,
        service_key: &str,
    ) -> Result<Box<dyn BackendClient>, ClientError>;
}

/// Reject empty endpoint or key before building anything.
pub fn require_credentials(endpoint_url: &str, key: &str) -> Result<(), ClientError> {
    if endpoint_url.trim().is_empty() {
        return Err(ClientError::MissingCredentials("endpoint URL is empty"));
    }
    if key.trim().is_empty() {
        return Err(ClientError::MissingCredentials("key is empty"));
    }
    Ok(())
}
