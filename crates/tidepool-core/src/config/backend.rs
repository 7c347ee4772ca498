//! Backend database configuration types.
//!
//! The backend is reached over its REST interface. Connection credentials are
//! normally supplied per session by the `configure` tool; deployment-wide
//! defaults can seed new sessions. Each default is resolved in order of
//! precedence:
//! 1. the named environment variable
//! 2. the inline value

use serde::{Deserialize, Serialize};

/// Configuration for the backend REST client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Name of the remote procedure that lists tables.
    #[serde(default = "default_introspection_function")]
    pub introspection_function: String,

    /// Per-request timeout of the REST client, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deployment-wide default credentials for new sessions.
    #[serde(default)]
    pub defaults: DefaultCredentials,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            introspection_function: default_introspection_function(),
            request_timeout_secs: default_request_timeout(),
            defaults: DefaultCredentials::default(),
        }
    }
}

/// Default credentials, each either inline or read from an environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultCredentials {
    /// Environment variable containing the endpoint URL.
    #[serde(default = "default_endpoint_url_env")]
    pub endpoint_url_env: String,

    /// Inline endpoint URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Environment variable containing the anonymous key.
    #[serde(default = "default_anon_key_env")]
    pub anon_key_env: String,

    /// Inline anonymous key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,

    /// Environment variable containing the service key.
    #[serde(default = "default_service_key_env")]
    pub service_key_env: String,

    /// Inline service key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
}

impl Default for DefaultCredentials {
    fn default() -> Self {
        Self {
            endpoint_url_env: default_endpoint_url_env(),
            endpoint_url: None,
            anon_key_env: default_anon_key_env(),
            anon_key: None,
            service_key_env: default_service_key_env(),
            service_key: None,
        }
    }
}

/// Fully resolved default credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub endpoint_url: String,
    pub anon_key: String,
    pub service_key: Option<String>,
}

impl DefaultCredentials {
    /// Resolve the defaults.
    ///
    /// Returns `None` unless both the endpoint URL and the anonymous key
    /// resolve to non-empty values.
    pub fn resolve(&self) -> Option<ResolvedCredentials> {
        let endpoint_url = resolve_value(&self.endpoint_url_env, self.endpoint_url.as_ref())?;
        let anon_key = resolve_value(&self.anon_key_env, self.anon_key.as_ref())?;
        let service_key = resolve_value(&self.service_key_env, self.service_key.as_ref());
        Some(ResolvedCredentials {
            endpoint_url,
            anon_key,
            service_key,
        })
    }
}

fn resolve_value(env_var: &str, inline: Option<&String>) -> Option<String> {
    if !env_var.is_empty()
        && let Ok(value) = std::env::var(env_var)
        && !value.trim().is_empty()
    {
        return Some(value.trim().to_string());
    }
    inline
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_introspection_function() -> String {
    "list_tables".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_endpoint_url_env() -> String {
    "TIDEPOOL_ENDPOINT_URL".to_string()
}

fn default_anon_key_env() -> String {
    "TIDEPOOL_ANON_KEY".to_string()
}

fn default_service_key_env() -> String {
    "TIDEPOOL_SERVICE_KEY".to_string()
}
