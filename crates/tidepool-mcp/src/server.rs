//! MCP server implementation.
//!
//! [`McpServer`] maps JSON-RPC requests onto the session actor for the
//! calling session. The transport decides which session a request belongs
//! to: stdio binds one fixed session, HTTP takes it from the bearer token.

use crate::error::McpError;
use crate::http_transport;
use crate::protocol::*;
use crate::sessions::SessionManager;
use serde_json::{Value, json};
use std::sync::Arc;
use tidepool_biscuit::TokenVerifier;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// The MCP server.
#[derive(Clone)]
pub struct McpServer {
    sessions: Arc<SessionManager>,
}

impl McpServer {
    /// Create a server over a session manager.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Run the server with stdio transport, bound to `session_id`.
    ///
    /// Reads newline-delimited JSON-RPC from stdin until EOF. Logs must not
    /// go to stdout while this runs.
    pub async fn run_stdio(&self, session_id: &str) -> Result<(), McpError> {
        tracing::info!(session_id = %session_id, "Starting MCP server with stdio transport");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                Ok(request) if request.is_notification() => {
                    self.handle_request(session_id, request).await;
                    continue;
                }
                Ok(request) => self.handle_request(session_id, request).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Unparseable JSON-RPC message on stdin");
                    JsonRpcResponse::error(None, codes::PARSE_ERROR, format!("Parse error: {}", e))
                }
            };

            let mut response_json = serde_json::to_string(&response)?;
            response_json.push('\n');
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.flush().await?;
        }

        tracing::info!("stdin closed; MCP stdio transport stopped");
        Ok(())
    }

    /// Run the server with HTTP transport.
    pub async fn run_http(&self, bind_address: &str, verifier: TokenVerifier) -> Result<(), McpError> {
        let app = http_transport::create_router(self.clone(), verifier);

        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .map_err(|e| {
                McpError::StartupFailed(format!("Failed to bind to {}: {}", bind_address, e))
            })?;

        tracing::info!(address = %bind_address, "MCP HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(())
    }

    /// Handle a JSON-RPC request on behalf of `session_id`.
    pub async fn handle_request(&self, session_id: &str, request: JsonRpcRequest) -> JsonRpcResponse {
        self.handle_request_until(session_id, None, request).await
    }

    /// Handle a request whose session credential lapses at `expires_at`
    /// (unix seconds). The session's cached actor lives no longer than that.
    pub async fn handle_request_until(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
        request: JsonRpcRequest,
    ) -> JsonRpcResponse {
        let id = request.id.clone();

        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            );
        }

        tracing::debug!(session_id = %session_id, method = %request.method, "JSON-RPC request");

        match request.method.as_str() {
            "initialize" => self.handle_initialize(session_id, expires_at, id).await,
            "notifications/initialized" | "initialized" | "ping" => {
                JsonRpcResponse::success(id, json!({}))
            }
            "tools/list" => self.handle_list_tools(session_id, expires_at, id).await,
            "tools/call" => {
                self.handle_call_tool(session_id, expires_at, id, request.params)
                    .await
            }
            "shutdown" => self.handle_shutdown(session_id, id),
            _ => JsonRpcResponse::error(
                id,
                codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    async fn handle_initialize(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
        id: Option<Value>,
    ) -> JsonRpcResponse {
        let actor = match self.sessions.actor_until(session_id, expires_at).await {
            Ok(actor) => actor,
            Err(e) => return internal_error(id, session_id, e.to_string()),
        };
        match actor.server_info().await {
            Ok(info) => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": info.protocol_version,
                    "serverInfo": {
                        "name": info.name,
                        "version": info.version
                    },
                    "capabilities": {
                        "tools": {
                            "listChanged": false
                        }
                    }
                }),
            ),
            Err(e) => internal_error(id, session_id, e.to_string()),
        }
    }

    async fn handle_list_tools(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
        id: Option<Value>,
    ) -> JsonRpcResponse {
        let actor = match self.sessions.actor_until(session_id, expires_at).await {
            Ok(actor) => actor,
            Err(e) => return internal_error(id, session_id, e.to_string()),
        };
        match actor.definitions().await {
            Ok(tools) => JsonRpcResponse::success(id, json!({ "tools": tools })),
            Err(e) => internal_error(id, session_id, e.to_string()),
        }
    }

    async fn handle_call_tool(
        &self,
        session_id: &str,
        expires_at: Option<i64>,
        id: Option<Value>,
        params: Option<Value>,
    ) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(params) => params,
                Err(e) => {
                    return JsonRpcResponse::error(
                        id,
                        codes::INVALID_PARAMS,
                        format!("Invalid params: {}", e),
                    );
                }
            },
            None => return JsonRpcResponse::error(id, codes::INVALID_PARAMS, "Missing params"),
        };

        let actor = match self.sessions.actor_until(session_id, expires_at).await {
            Ok(actor) => actor,
            Err(e) => return internal_error(id, session_id, e.to_string()),
        };

        let response = actor
            .dispatch(&params.name, params.arguments)
            .await
            .into_call_response();
        match serde_json::to_value(response) {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => internal_error(id, session_id, e.to_string()),
        }
    }

    fn handle_shutdown(&self, session_id: &str, id: Option<Value>) -> JsonRpcResponse {
        tracing::info!(session_id = %session_id, "MCP server shutdown requested");
        JsonRpcResponse::success(id, json!(null))
    }
}

fn internal_error(id: Option<Value>, session_id: &str, message: String) -> JsonRpcResponse {
    tracing::error!(session_id = %session_id, error = %message, "JSON-RPC request failed");
    JsonRpcResponse::error(id, codes::INTERNAL_ERROR, message)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SqliteSessionStore;
    use tidepool_backend::{BackendClient, ClientError, ClientFactory};

    struct NoClients;

    impl ClientFactory for NoClients {
        fn create_client(&self, _: &str, _: &str) -> Result<Box<dyn BackendClient>, ClientError> {
            Err(ClientError::MissingCredentials("unused"))
        }

        fn create_service_client(
            &self,
            _: &str,
            _: &str,
        ) -> Result<Box<dyn BackendClient>, ClientError> {
            Err(ClientError::MissingCredentials("unused"))
        }
    }

    async fn server() -> McpServer {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        McpServer::new(Arc::new(SessionManager::new(
            Arc::new(store),
            Arc::new(NoClients),
        )))
    }

    #[tokio::test]
    async fn test_initialize() {
        let server = server().await;
        let response = server
            .handle_request("s1", JsonRpcRequest::new(1, "initialize", None))
            .await;

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(result["serverInfo"]["name"], json!("tidepool"));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let server = server().await;
        let response = server
            .handle_request("s1", JsonRpcRequest::new(1, "tools/list", None))
            .await;

        let tools = response.result.unwrap()["tools"].clone();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["add", "configure", "list_tables"]);
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[tokio::test]
    async fn test_call_tool() {
        let server = server().await;
        let response = server
            .handle_request(
                "s1",
                JsonRpcRequest::new(
                    1,
                    "tools/call",
                    Some(json!({"name": "add", "arguments": {"a": 2, "b": 3}})),
                ),
            )
            .await;

        assert_eq!(
            response.result.unwrap(),
            json!({"content": [{"type": "text", "text": "5"}], "isError": false})
        );
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let server = server().await;
        let response = server
            .handle_request(
                "s1",
                JsonRpcRequest::new(
                    1,
                    "tools/call",
                    Some(json!({"name": "nonexistent", "arguments": {}})),
                ),
            )
            .await;

        // Tool failures are results, not protocol errors.
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        assert_eq!(result["content"][0]["text"], json!("unknown tool: nonexistent"));
    }

    #[tokio::test]
    async fn test_call_tool_without_params() {
        let server = server().await;
        let response = server
            .handle_request("s1", JsonRpcRequest::new(1, "tools/call", None))
            .await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let server = server().await;
        let response = server
            .handle_request("s1", JsonRpcRequest::new(7, "resources/list", None))
            .await;
        assert_eq!(response.id, Some(json!(7)));
        assert_eq!(response.error.unwrap().code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let server = server().await;
        let mut request = JsonRpcRequest::new(1, "ping", None);
        request.jsonrpc = "1.0".to_string();
        let response = server.handle_request("s1", request).await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }
}
