//! `list_tables`: list the backend's tables using session credentials.

use super::{Tool, ToolContext, ToolError};
use crate::protocol::ToolContent;
use crate::state::SessionState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tidepool_backend::{BackendClient, ClientError};

/// One row of the introspection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListTablesInput {}

pub struct ListTablesTool;

#[async_trait]
impl Tool for ListTablesTool {
    type Input = ListTablesInput;

    fn name(&self) -> &'static str {
        "list_tables"
    }

    fn description(&self) -> &'static str {
        "List tables in the configured backend database (schema, name, comment)"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn call(
        &self,
        _input: ListTablesInput,
        ctx: &ToolContext,
    ) -> Result<Vec<ToolContent>, ToolError> {
        let state = ctx.state.read().await?;
        let client = client_for(self.name(), &state, ctx)?;

        let raw = client.list_tables().await.map_err(query_error)?;
        let tables = parse_tables(raw)?;

        tracing::debug!(
            session_id = %ctx.session_id(),
            tables = tables.len(),
            "Listed backend tables"
        );

        let text =
            serde_json::to_string(&tables).map_err(|e| ToolError::Internal(e.to_string()))?;
        Ok(vec![ToolContent::text(text)])
    }
}

/// Build a client from a fresh state snapshot, preferring the service key.
fn client_for(
    tool: &str,
    state: &SessionState,
    ctx: &ToolContext,
) -> Result<Box<dyn BackendClient>, ToolError> {
    let not_configured = || ToolError::NotConfigured {
        tool: tool.to_string(),
    };
    if !state.is_configured {
        return Err(not_configured());
    }
    let endpoint_url = non_blank(&state.endpoint_url).ok_or_else(not_configured)?;
    let anon_key = non_blank(&state.anon_key).ok_or_else(not_configured)?;

    let client = match non_blank(&state.service_key) {
        Some(service_key) => ctx.clients.create_service_client(endpoint_url, service_key),
        None => ctx.clients.create_client(endpoint_url, anon_key),
    };
    client.map_err(|e| ToolError::Configuration(e.to_string()))
}

fn query_error(err: ClientError) -> ToolError {
    match err {
        ClientError::Decode(_) => ToolError::Parse,
        e if e.is_configuration() => ToolError::Configuration(e.to_string()),
        e => ToolError::Backend(e.to_string()),
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// The result must be an array of `{schema, name, comment}` records.
fn parse_tables(raw: Value) -> Result<Vec<TableInfo>, ToolError> {
    serde_json::from_value(raw).map_err(|_| ToolError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tables() {
        let tables = parse_tables(json!([
            {"schema": "public", "name": "users", "comment": null},
            {"schema": "public", "name": "orders", "comment": "Customer orders"}
        ]))
        .unwrap();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[1].comment.as_deref(), Some("Customer orders"));
    }

    #[test]
    fn test_parse_tables_rejects_wrong_shape() {
        assert!(matches!(parse_tables(json!({"tables": []})), Err(ToolError::Parse)));
        assert!(matches!(
            parse_tables(json!([{"schema": "public"}])),
            Err(ToolError::Parse)
        ));
        assert!(matches!(
            parse_tables(json!([{"schema": 1, "name": "users", "comment": null}])),
            Err(ToolError::Parse)
        ));
    }

    #[test]
    fn test_query_error_classification() {
        assert!(matches!(
            query_error(ClientError::Decode("expected value".to_string())),
            ToolError::Parse
        ));
        assert!(matches!(
            query_error(ClientError::MissingCredentials("endpoint")),
            ToolError::Configuration(_)
        ));
        match query_error(ClientError::Backend {
            status: 404,
            message: "no such function".to_string(),
        }) {
            ToolError::Backend(message) => assert_eq!(message, "no such function"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_result_is_valid() {
        assert!(parse_tables(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_input_accepts_empty_object() {
        assert!(serde_json::from_value::<ListTablesInput>(json!({})).is_ok());
    }
}
