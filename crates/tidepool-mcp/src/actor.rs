//! Per-session actor.
//!
//! A [`SessionActor`] owns everything one session needs: its bound state
//! store, the client factory and the tool registry built at initialization.
//! The registry is immutable once the actor is ready, so tool calls on the
//! same actor run concurrently without further coordination.

use crate::error::McpError;
use crate::protocol::{ServerInfo, ToolDefinition};
use crate::state::{SessionStateStore, SessionStore};
use crate::tools::{ToolContext, ToolError, ToolRegistry, ToolResult, register_default_tools};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tidepool_backend::ClientFactory;
use tokio::sync::RwLock;

/// Lifecycle status of a session actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl fmt::Display for ActorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct ReadyActor {
    info: ServerInfo,
    tools: ToolRegistry,
}

enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready(Arc<ReadyActor>),
    Failed(String),
}

impl Lifecycle {
    fn status(&self) -> ActorStatus {
        match self {
            Self::Uninitialized => ActorStatus::Uninitialized,
            Self::Initializing => ActorStatus::Initializing,
            Self::Ready(_) => ActorStatus::Ready,
            Self::Failed(_) => ActorStatus::Failed,
        }
    }
}

/// The actor serving one session.
pub struct SessionActor {
    ctx: ToolContext,
    lifecycle: RwLock<Lifecycle>,
}

impl SessionActor {
    /// Create an uninitialized actor for `session_id`.
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<dyn SessionStore>,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            ctx: ToolContext::new(SessionStateStore::new(store, session_id), clients),
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
        }
    }

    pub fn session_id(&self) -> &str {
        self.ctx.session_id()
    }

    /// The session's bound state store.
    pub fn state(&self) -> &SessionStateStore {
        &self.ctx.state
    }

    pub async fn status(&self) -> ActorStatus {
        self.lifecycle.read().await.status()
    }

    /// Why initialization failed, if it did.
    pub async fn failure_reason(&self) -> Option<String> {
        match &*self.lifecycle.read().await {
            Lifecycle::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Register the standard tools and become ready.
    pub async fn init(&self) -> ActorStatus {
        self.init_with(|| {
            let mut tools = ToolRegistry::new();
            register_default_tools(&mut tools)?;
            Ok(tools)
        })
        .await
    }

    /// Initialize with a custom registry builder.
    ///
    /// Only the first call does any work; later calls return the current
    /// status unchanged.
    pub async fn init_with<F>(&self, build: F) -> ActorStatus
    where
        F: FnOnce() -> Result<ToolRegistry, McpError>,
    {
        {
            let mut lifecycle = self.lifecycle.write().await;
            if !matches!(*lifecycle, Lifecycle::Uninitialized) {
                return lifecycle.status();
            }
            *lifecycle = Lifecycle::Initializing;
        }

        let next = match build() {
            Ok(tools) => {
                tracing::info!(
                    session_id = %self.session_id(),
                    tool_count = tools.len(),
                    "Session actor ready"
                );
                Lifecycle::Ready(Arc::new(ReadyActor {
                    info: ServerInfo::current(),
                    tools,
                }))
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id(),
                    error = %e,
                    "Session actor failed to initialize"
                );
                Lifecycle::Failed(e.to_string())
            }
        };

        let mut lifecycle = self.lifecycle.write().await;
        *lifecycle = next;
        lifecycle.status()
    }

    async fn ready(&self) -> Result<Arc<ReadyActor>, ToolError> {
        match &*self.lifecycle.read().await {
            Lifecycle::Ready(ready) => Ok(ready.clone()),
            other => Err(ToolError::ActorNotReady {
                status: other.status().to_string(),
            }),
        }
    }

    /// Run a tool call against this session.
    pub async fn dispatch(&self, tool: &str, arguments: Value) -> ToolResult {
        match self.ready().await {
            Ok(ready) => ready.tools.dispatch(tool, arguments, &self.ctx).await,
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id(),
                    tool = %tool,
                    error = %err,
                    "Tool call on an actor that is not ready"
                );
                ToolResult::failure(&err)
            }
        }
    }

    /// Tool definitions, sorted by name.
    pub async fn definitions(&self) -> Result<Vec<ToolDefinition>, ToolError> {
        Ok(self.ready().await?.tools.definitions())
    }

    pub async fn server_info(&self) -> Result<ServerInfo, ToolError> {
        Ok(self.ready().await?.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SqliteSessionStore;
    use serde_json::json;
    use tidepool_backend::{BackendClient, ClientError};

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

    async fn actor() -> SessionActor {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        SessionActor::new("s1", Arc::new(store), Arc::new(NoClients))
    }

    #[tokio::test]
    async fn test_uninitialized_actor_rejects_calls() {
        let actor = actor().await;
        let result = actor.dispatch("add", json!({"a": 1, "b": 2})).await;
        assert_eq!(
            result.failure_message(),
            Some("session actor is not ready (uninitialized)")
        );
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let actor = actor().await;
        assert_eq!(actor.init().await, ActorStatus::Ready);
        assert_eq!(actor.init().await, ActorStatus::Ready);
        assert_eq!(actor.definitions().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_init() {
        let actor = actor().await;
        let status = actor
            .init_with(|| Err(McpError::StartupFailed("no tools today".to_string())))
            .await;
        assert_eq!(status, ActorStatus::Failed);
        assert!(actor.failure_reason().await.unwrap().contains("no tools today"));

        // A failed actor stays failed.
        assert_eq!(actor.init().await, ActorStatus::Failed);
        assert!(matches!(
            actor.definitions().await,
            Err(ToolError::ActorNotReady { .. })
        ));
    }

    #[tokio::test]
    async fn test_server_info_when_ready() {
        let actor = actor().await;
        actor.init().await;
        let info = actor.server_info().await.unwrap();
        assert_eq!(info.name, "tidepool");
    }
}
