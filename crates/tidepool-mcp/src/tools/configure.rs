//! `configure`: store backend credentials for the calling session.

use super::{Tool, ToolContext, ToolError};
use crate::protocol::ToolContent;
use crate::state::SessionStatePatch;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureInput {
    pub endpoint_url: String,
    pub anon_key: String,
    #[serde(default)]
    pub service_key: Option<String>,
}

/// Replaces the session's credentials and marks it configured.
///
/// Credentials are replaced as a whole: a call without `serviceKey` clears
/// any service key stored by an earlier call.
pub struct ConfigureTool;

#[async_trait]
impl Tool for ConfigureTool {
    type Input = ConfigureInput;

    fn name(&self) -> &'static str {
        "configure"
    }

    fn description(&self) -> &'static str {
        "Set the backend endpoint URL and keys used by this session's database tools"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "endpointUrl": {
                    "type": "string",
                    "minLength": 1,
                    "format": "uri",
                    "description": "Base URL of the backend, e.g. https://project.example.com"
                },
                "anonKey": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Anonymous (public) API key"
                },
                "serviceKey": {
                    "type": "string",
                    "description": "Optional privileged service key"
                }
            },
            "required": ["endpointUrl", "anonKey"],
            "additionalProperties": false
        })
    }

    fn refine(&self, input: &ConfigureInput) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        match Url::parse(input.endpoint_url.trim()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            Ok(url) => problems.push(format!(
                "endpointUrl must be an http(s) URL with a host, got scheme '{}'",
                url.scheme()
            )),
            Err(e) => problems.push(format!("endpointUrl is not a valid URL: {e}")),
        }
        if input.anon_key.trim().is_empty() {
            problems.push("anonKey must not be blank".to_string());
        }
        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }

    async fn call(
        &self,
        input: ConfigureInput,
        ctx: &ToolContext,
    ) -> Result<Vec<ToolContent>, ToolError> {
        let endpoint_url = input.endpoint_url.trim().to_string();
        let service_key = input
            .service_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let has_service_key = service_key.is_some();

        ctx.state
            .update(SessionStatePatch::replace_credentials(
                endpoint_url.clone(),
                input.anon_key.trim(),
                service_key,
            ))
            .await?;

        tracing::info!(
            session_id = %ctx.session_id(),
            endpoint_url = %endpoint_url,
            service_key = has_service_key,
            "Session configured"
        );

        Ok(vec![ToolContent::text(format!(
            "Configured backend endpoint {endpoint_url}"
        ))])
    }
}
