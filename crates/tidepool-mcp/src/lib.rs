//! # tidepool-mcp
//!
//! MCP (Model Context Protocol) server for Tidepool.
//!
//! Every client session gets its own [`SessionActor`] holding a small, fixed
//! set of tools:
//!
//! | Tool | Input | Description |
//! |------|-------|-------------|
//! | `configure` | `{endpointUrl, anonKey, serviceKey?}` | Store backend credentials for this session |
//! | `add` | `{a, b}` | Sum two numbers |
//! | `list_tables` | `{}` | List backend tables using the session's credentials |
//!
//! ## Architecture
//!
//! ```text
//! AI Agent
//!       │
//!       │ MCP protocol (stdio, or HTTP + session token)
//!       ▼
//! ┌──────────────────┐
//! │  McpServer       │
//! │  SessionManager  │  ← one actor per session id
//! │  SessionActor    │  ← tool registry, schema validation
//! │  SessionState    │  ← SQLite, survives restarts
//! └────────┬─────────┘
//!          │ list_tables
//!          ▼
//!    Backend REST endpoint
//! ```
//!
//! ## Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tidepool_backend::RestClientFactory;
//! use tidepool_mcp::{McpServer, SessionManager, SqliteSessionStore};
//!
//! let store = SqliteSessionStore::open(&config.store).await?;
//! let clients = RestClientFactory::new(&config.backend)?;
//! let sessions = SessionManager::new(Arc::new(store), Arc::new(clients))
//!     .with_defaults(config.backend.defaults.resolve());
//!
//! McpServer::new(Arc::new(sessions)).run_stdio("local").await?;
//! ```

pub mod actor;
pub mod error;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod sessions;
pub mod state;
pub mod tools;

// Re-export main types
pub use actor::{ActorStatus, SessionActor};
pub use error::McpError;
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ServerInfo, ToolContent,
    ToolDefinition,
};
pub use server::McpServer;
pub use sessions::SessionManager;
pub use state::{
    SessionState, SessionStatePatch, SessionStateStore, SessionStore, SqliteSessionStore,
    StoreError,
};
pub use tools::{Tool, ToolContext, ToolError, ToolRegistry, ToolResult, register_default_tools};
