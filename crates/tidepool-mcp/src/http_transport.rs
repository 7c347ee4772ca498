//! HTTP transport for the MCP server.
//!
//! `POST /mcp` carries JSON-RPC, `DELETE /mcp` ends the caller's session and
//! `GET /health` is open. Both `/mcp` routes require a session token in
//! `Authorization: Bearer <token>`; the token's session id selects the
//! session actor.

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, codes};
use crate::server::McpServer;
use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tidepool_biscuit::{TokenVerifier, VerifiedSession};
use tower_http::trace::TraceLayer;

/// Shared state of the HTTP transport.
#[derive(Clone)]
pub struct HttpState {
    server: McpServer,
    verifier: TokenVerifier,
}

/// Create the HTTP router for MCP.
pub fn create_router(server: McpServer, verifier: TokenVerifier) -> Router {
    let state = HttpState { server, verifier };

    let mcp = Router::new()
        .route("/mcp", post(handle_mcp_post).delete(handle_mcp_delete))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(mcp)
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject requests without a valid session token.
async fn require_session(
    State(state): State<HttpState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = extract_bearer(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;

    let session = state.verifier.verify(&token).map_err(|e| {
        tracing::warn!(error = %e, "Rejected session token");
        StatusCode::UNAUTHORIZED
    })?;

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post(
    State(state): State<HttpState>,
    Extension(session): Extension<VerifiedSession>,
    body: String,
) -> Response {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(
                    None,
                    codes::PARSE_ERROR,
                    format!("Parse error: {}", e),
                )),
            )
                .into_response();
        }
    };

    let is_notification = request.is_notification();
    let response = state
        .server
        .handle_request_until(&session.session_id, Some(session.expires_at), request)
        .await;

    if is_notification {
        StatusCode::ACCEPTED.into_response()
    } else {
        (StatusCode::OK, Json(response)).into_response()
    }
}

/// Handle DELETE requests to /mcp: evict the caller's session.
async fn handle_mcp_delete(
    State(state): State<HttpState>,
    Extension(session): Extension<VerifiedSession>,
) -> StatusCode {
    match state.server.sessions().evict(&session.session_id).await {
        Ok(_) => StatusCode::NO_CONTENT,
        Err(e) => {
            tracing::error!(session_id = %session.session_id, error = %e, "Failed to evict session");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "tidepool",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
