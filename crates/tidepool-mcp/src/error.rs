//! Error types for the MCP crate.

use crate::state::StoreError;
use thiserror::Error;

/// Errors that can occur in the MCP server outside of tool dispatch.
///
/// Tool failures never surface here; they are returned to the caller as
/// [`ToolResult::Failure`](crate::tools::ToolResult) values.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server or initialize an actor.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// A tool could not be registered.
    #[error("failed to register tool {name}: {reason}")]
    Registration { name: String, reason: String },

    /// Session state store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
