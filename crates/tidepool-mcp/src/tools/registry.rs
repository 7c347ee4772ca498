//! Registry of session tools.

use super::{Tool, ToolContext, ToolError, ToolHandler, ToolResult};
use crate::error::McpError;
use crate::protocol::ToolDefinition;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

struct RegisteredTool {
    definition: ToolDefinition,
    validator: jsonschema::Validator,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of available tools, keyed by name.
///
/// Input schemas are compiled once at registration.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed tool.
    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), McpError> {
        let name = tool.name();
        let description = tool.description();
        let schema = tool.input_schema();
        self.register_handler(name, description, schema, Arc::new(tool))
    }

    /// Register a handler under `name`.
    ///
    /// A second registration with the same name replaces the first.
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), McpError> {
        let name = name.into();
        let validator =
            jsonschema::validator_for(&input_schema).map_err(|e| McpError::Registration {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let entry = RegisteredTool {
            definition: ToolDefinition {
                name: name.clone(),
                description: description.into(),
                input_schema,
            },
            validator,
            handler,
        };

        if self.tools.insert(name.clone(), entry).is_some() {
            tracing::warn!(tool = %name, "Tool registered twice; keeping the latest definition");
        }
        Ok(())
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition.clone()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Validate `arguments` and run the named tool.
    ///
    /// Never fails and never panics: every error, including a handler
    /// panic, is logged and returned as [`ToolResult::Failure`].
    pub async fn dispatch(&self, name: &str, arguments: Value, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.tools.get(name) else {
            let err = ToolError::UnknownTool {
                name: name.to_string(),
            };
            tracing::warn!(session_id = %ctx.session_id(), tool = %name, "Unknown tool requested");
            return ToolResult::failure(&err);
        };

        let details: Vec<String> = tool
            .validator
            .iter_errors(&arguments)
            .map(|e| {
                let path = e.instance_path().to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        if !details.is_empty() {
            let err = ToolError::InvalidInput {
                tool: name.to_string(),
                details,
            };
            tracing::warn!(
                session_id = %ctx.session_id(),
                tool = %name,
                error = %err,
                "Tool input rejected"
            );
            return ToolResult::failure(&err);
        }

        let outcome = AssertUnwindSafe(tool.handler.invoke(arguments, ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(content)) => {
                tracing::debug!(session_id = %ctx.session_id(), tool = %name, "Tool call succeeded");
                ToolResult::Ok { content }
            }
            Ok(Err(err)) => {
                match &err {
                    ToolError::Storage(_) | ToolError::Internal(_) => tracing::error!(
                        session_id = %ctx.session_id(),
                        tool = %name,
                        kind = err.kind(),
                        error = %err,
                        "Tool call failed"
                    ),
                    _ => tracing::warn!(
                        session_id = %ctx.session_id(),
                        tool = %name,
                        kind = err.kind(),
                        error = %err,
                        "Tool call failed"
                    ),
                }
                ToolResult::failure(&err)
            }
            Err(panic) => {
                let err = ToolError::Internal(panic_message(panic.as_ref()));
                tracing::error!(
                    session_id = %ctx.session_id(),
                    tool = %name,
                    error = %err,
                    "Tool handler panicked"
                );
                ToolResult::failure(&err)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ToolContent;
    use crate::state::{SessionStateStore, SqliteSessionStore};
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
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

    async fn context() -> ToolContext {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        ToolContext::new(SessionStateStore::new(Arc::new(store), "s1"), Arc::new(NoClients))
    }

    #[derive(Deserialize)]
    struct EchoInput {
        text: String,
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        type Input = EchoInput;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Echo text back"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"],
                "additionalProperties": false
            })
        }

        fn refine(&self, input: &EchoInput) -> Result<(), Vec<String>> {
            if input.text == "forbidden" {
                return Err(vec!["text is forbidden".to_string()]);
            }
            Ok(())
        }

        async fn call(
            &self,
            input: EchoInput,
            _ctx: &ToolContext,
        ) -> Result<Vec<ToolContent>, ToolError> {
            if input.text == "panic" {
                panic!("echo exploded");
            }
            Ok(vec![ToolContent::text(input.text)])
        }
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let ctx = context().await;

        let result = registry.dispatch("echo", json!({"text": "hi"}), &ctx).await;
        assert_eq!(result.first_text(), Some("hi"));
    }

    #[tokio::test]
    async fn test_schema_violation_is_invalid_input() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let ctx = context().await;

        let result = registry.dispatch("echo", json!({"text": 5}), &ctx).await;
        let message = result.failure_message().unwrap();
        assert!(message.starts_with("invalid input for tool echo"), "{message}");
    }

    #[tokio::test]
    async fn test_refinement_failure_is_invalid_input() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let ctx = context().await;

        let result = registry
            .dispatch("echo", json!({"text": "forbidden"}), &ctx)
            .await;
        assert_eq!(
            result.failure_message(),
            Some("invalid input for tool echo: text is forbidden")
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        let ctx = context().await;

        let result = registry.dispatch("nope", json!({}), &ctx).await;
        assert_eq!(result.failure_message(), Some("unknown tool: nope"));
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        let ctx = context().await;

        let result = registry.dispatch("echo", json!({"text": "panic"}), &ctx).await;
        assert_eq!(result.failure_message(), Some("internal error: echo exploded"));

        // The registry is still usable afterwards.
        let result = registry.dispatch("echo", json!({"text": "ok"}), &ctx).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_registration_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo).unwrap();
        registry.register(Echo).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_schema_is_rejected() {
        let mut registry = ToolRegistry::new();
        let result = registry.register_handler(
            "broken",
            "Broken schema",
            json!({"type": "not-a-type"}),
            Arc::new(Echo),
        );
        assert!(matches!(result, Err(McpError::Registration { .. })));
        assert!(registry.is_empty());
    }
}
