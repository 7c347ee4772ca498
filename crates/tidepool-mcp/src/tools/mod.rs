//! Session tools.
//!
//! A tool is a named operation with a JSON schema for its input. Tools are
//! registered into a [`ToolRegistry`] once, when a session actor
//! initializes, and never change afterwards.
//!
//! Input goes through three gates before a handler runs:
//!
//! 1. the compiled JSON schema (structural check, all errors collected)
//! 2. deserialization into the tool's typed input
//! 3. the tool's own [`Tool::refine`] checks (e.g. URL well-formedness)
//!
//! Whatever happens afterwards, including a panic inside the handler, the
//! caller receives a [`ToolResult`].

pub mod add;
pub mod configure;
pub mod list_tables;
pub mod registry;

use crate::error::McpError;
use crate::protocol::{CallToolResponse, ToolContent};
use crate::state::{SessionStateStore, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tidepool_backend::ClientFactory;

pub use add::AddTool;
pub use configure::ConfigureTool;
pub use list_tables::{ListTablesTool, TableInfo};
pub use registry::ToolRegistry;

/// Outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolResult {
    Ok { content: Vec<ToolContent> },
    Failure { message: String },
}

impl ToolResult {
    /// A successful result with a single text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Ok {
            content: vec![ToolContent::text(text)],
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self::Failure {
            message: error.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    /// The first text payload of a successful result.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Self::Ok { content } => content.first().map(ToolContent::as_text),
            Self::Failure { .. } => None,
        }
    }

    /// The failure message, if any.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Failure { message } => Some(message),
        }
    }

    /// Wire representation; failures become a text item flagged `isError`.
    pub fn into_call_response(self) -> CallToolResponse {
        match self {
            Self::Ok { content } => CallToolResponse {
                content,
                is_error: false,
            },
            Self::Failure { message } => CallToolResponse {
                content: vec![ToolContent::text(message)],
                is_error: true,
            },
        }
    }
}

/// Reasons a tool call fails.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input did not satisfy the tool's schema or refinements.
    #[error("invalid input for tool {tool}: {}", .details.join("; "))]
    InvalidInput { tool: String, details: Vec<String> },

    /// The session has no backend credentials yet.
    #[error(
        "not configured: call the `configure` tool with endpointUrl and anonKey before using `{tool}`"
    )]
    NotConfigured { tool: String },

    /// The backend reported an error; the message is passed through verbatim.
    #[error("{0}")]
    Backend(String),

    /// The backend answered with data of an unexpected shape.
    #[error("failed to parse output")]
    Parse,

    /// No tool with that name is registered.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// The session actor is not in the ready state.
    #[error("session actor is not ready ({status})")]
    ActorNotReady { status: String },

    /// A backend client could not be constructed from the credentials.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The session state store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Unexpected failure inside a handler.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::NotConfigured { .. } => "not_configured",
            Self::Backend(_) => "backend",
            Self::Parse => "parse",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::ActorNotReady { .. } => "actor_not_ready",
            Self::Configuration(_) => "configuration",
            Self::Storage(_) => "storage",
            Self::Internal(_) => "internal",
        }
    }
}

/// What a handler can see: its own session's state and a client factory.
#[derive(Clone)]
pub struct ToolContext {
    pub state: SessionStateStore,
    pub clients: Arc<dyn ClientFactory>,
}

impl ToolContext {
    pub fn new(state: SessionStateStore, clients: Arc<dyn ClientFactory>) -> Self {
        Self { state, clients }
    }

    pub fn session_id(&self) -> &str {
        self.state.session_id()
    }
}

/// A strongly typed tool.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Input: DeserializeOwned + Send + 'static;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the input object.
    fn input_schema(&self) -> Value;

    /// Checks the schema cannot express. Each entry is one problem.
    fn refine(&self, _input: &Self::Input) -> Result<(), Vec<String>> {
        Ok(())
    }

    async fn call(
        &self,
        input: Self::Input,
        ctx: &ToolContext,
    ) -> Result<Vec<ToolContent>, ToolError>;
}

/// Type-erased handler stored in the registry.
///
/// Receives schema-checked JSON; typed parsing happens here.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, arguments: Value, ctx: &ToolContext)
    -> Result<Vec<ToolContent>, ToolError>;
}

#[async_trait]
impl<T: Tool> ToolHandler for T {
    async fn invoke(
        &self,
        arguments: Value,
        ctx: &ToolContext,
    ) -> Result<Vec<ToolContent>, ToolError> {
        let input: T::Input =
            serde_json::from_value(arguments).map_err(|e| ToolError::InvalidInput {
                tool: self.name().to_string(),
                details: vec![e.to_string()],
            })?;
        self.refine(&input)
            .map_err(|details| ToolError::InvalidInput {
                tool: self.name().to_string(),
                details,
            })?;
        self.call(input, ctx).await
    }
}

/// Register the fixed tool set every session actor exposes.
pub fn register_default_tools(registry: &mut ToolRegistry) -> Result<(), McpError> {
    registry.register(ConfigureTool)?;
    registry.register(AddTool)?;
    registry.register(ListTablesTool)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_becomes_error_response() {
        let result = ToolResult::failure(&ToolError::Parse);
        let response = result.into_call_response();
        assert!(response.is_error);
        assert_eq!(response.content, vec![ToolContent::text("failed to parse output")]);
    }

    #[test]
    fn test_invalid_input_lists_details() {
        let err = ToolError::InvalidInput {
            tool: "add".to_string(),
            details: vec!["a is required".to_string(), "b is required".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "invalid input for tool add: a is required; b is required"
        );
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_default_tools_are_registered() {
        let mut registry = ToolRegistry::new();
        register_default_tools(&mut registry).unwrap();
        assert_eq!(registry.names(), vec!["add", "configure", "list_tables"]);
    }
}
