//! REST backend client.
//!
//! Talks to a PostgREST-style endpoint. The key is sent both as the `apikey`
//! header and as a bearer token; table introspection is a single call to a
//! remote procedure (`POST {endpoint}/rest/v1/rpc/{function}`).

use crate::error::ClientError;
use crate::{BackendClient, ClientFactory, require_credentials};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;
use tidepool_core::BackendConfig;
use url::Url;

/// Builds [`RestClient`] handles that share one connection pool.
#[derive(Clone)]
pub struct RestClientFactory {
    http: reqwest::Client,
    introspection_function: String,
}

impl RestClientFactory {
    /// Create a factory from backend configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self {
            http,
            introspection_function: config.introspection_function.clone(),
        })
    }

    fn build(&self, endpoint_url: &str, key: &str) -> Result<Box<dyn BackendClient>, ClientError> {
        require_credentials(endpoint_url, key)?;
        let endpoint = parse_endpoint(endpoint_url)?;
        Ok(Box::new(RestClient {
            http: self.http.clone(),
            endpoint,
            key: key.to_string(),
            introspection_function: self.introspection_function.clone(),
        }))
    }
}

impl ClientFactory for RestClientFactory {
    fn create_client(
        &self,
        endpoint_url: &str,
        key: &str,
    ) -> Result<Box<dyn BackendClient>, ClientError> {
        self.build(endpoint_url, key)
    }

    fn create_service_client(
        &self,
        endpoint_url: &str,
        service_key: &str,
    ) -> Result<Box<dyn BackendClient>, ClientError> {
        self.build(endpoint_url, service_key)
    }
}

/// A client bound to one endpoint and key.
pub struct RestClient {
    http: reqwest::Client,
    endpoint: Url,
    key: String,
    introspection_function: String,
}

impl RestClient {
    fn rpc_url(&self, function: &str) -> String {
        format!(
            "{}/rest/v1/rpc/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            function
        )
    }

    async fn rpc(&self, function: &str, args: Value) -> Result<Value, ClientError> {
        let url = self.rpc_url(function);
        tracing::debug!(url = %url, "Calling backend procedure");

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = backend_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("backend request failed")
                    .to_string()
            });
            tracing::warn!(status = status.as_u16(), message = %message, "Backend returned an error");
            return Err(ClientError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(error = %e, "Backend returned a body that is not JSON");
            ClientError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl BackendClient for RestClient {
    async fn list_tables(&self) -> Result<Value, ClientError> {
        self.rpc(&self.introspection_function, json!({})).await
    }
}

fn parse_endpoint(endpoint_url: &str) -> Result<Url, ClientError> {
    let url = Url::parse(endpoint_url.trim()).map_err(|e| ClientError::InvalidEndpoint {
        url: endpoint_url.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidEndpoint {
            url: endpoint_url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Extract the error message from a backend error body.
///
/// PostgREST answers with `{"message": ..., "code": ..., "hint": ...}`; other
/// bodies are returned as-is when non-empty.
fn backend_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|m| m.as_str())
            .map(String::from)
            .or_else(|| Some(trimmed.to_string())),
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn rpc_list_tables(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
        let bearer = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if apikey == Some("anon") && bearer == Some("Bearer anon") {
            (
                StatusCode::OK,
                Json(json!([
                    {"schema": "public", "name": "todos", "comment": null}
                ])),
            )
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"message": "Invalid API key", "code": "401"})),
            )
        }
    }

    async fn rpc_html() -> (StatusCode, [(axum::http::HeaderName, &'static str); 1], &'static str) {
        (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/html")],
            "<html>oops</html>",
        )
    }

    async fn spawn_backend() -> String {
        let app = Router::new()
            .route("/rest/v1/rpc/list_tables", post(rpc_list_tables))
            .route("/rest/v1/rpc/html_tables", post(rpc_html));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn factory() -> RestClientFactory {
        RestClientFactory::new(&BackendConfig::default()).unwrap()
    }

    #[test]
    fn test_create_client_rejects_missing_credentials() {
        let factory = factory();
        assert!(matches!(
            factory.create_client("", "anon"),
            Err(ClientError::MissingCredentials(_))
        ));
        assert!(matches!(
            factory.create_service_client("https://db.example.com", ""),
            Err(ClientError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_create_client_rejects_bad_endpoint() {
        let factory = factory();
        let err = factory.create_client("not a url", "anon").err().unwrap();
        assert!(err.is_configuration());

        let err = factory
            .create_client("ftp://db.example.com", "anon")
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_backend_message() {
        assert_eq!(
            backend_message(r#"{"message": "permission denied", "code": "42501"}"#),
            Some("permission denied".to_string())
        );
        assert_eq!(
            backend_message("upstream timeout"),
            Some("upstream timeout".to_string())
        );
        assert_eq!(backend_message("   "), None);
    }

    #[tokio::test]
    async fn test_list_tables_sends_key() {
        let endpoint = spawn_backend().await;
        let client = factory().create_client(&endpoint, "anon").unwrap();

        let tables = client.list_tables().await.unwrap();
        assert_eq!(
            tables,
            json!([{"schema": "public", "name": "todos", "comment": null}])
        );
    }

    #[tokio::test]
    async fn test_list_tables_surfaces_backend_error() {
        let endpoint = spawn_backend().await;
        let client = factory()
            .create_client(&format!("{}/", endpoint), "wrong")
            .unwrap();

        match client.list_tables().await {
            Err(ClientError::Backend { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_decode_error() {
        let endpoint = spawn_backend().await;
        let config = BackendConfig {
            introspection_function: "html_tables".to_string(),
            ..BackendConfig::default()
        };
        let client = RestClientFactory::new(&config)
            .unwrap()
            .create_client(&endpoint, "anon")
            .unwrap();

        let err = client.list_tables().await.err().unwrap();
        assert!(matches!(err, ClientError::Decode(_)), "{err}");
        assert!(!err.is_configuration());
    }
}
