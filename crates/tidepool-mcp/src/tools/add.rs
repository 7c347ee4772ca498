//! `add`: sum two numbers.

use super::{Tool, ToolContext, ToolError};
use crate::protocol::ToolContent;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct AddInput {
    pub a: f64,
    pub b: f64,
}

/// Returns `a + b` as text.
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    type Input = AddInput;

    fn name(&self) -> &'static str {
        "add"
    }

    fn description(&self) -> &'static str {
        "Add two numbers and return the sum"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number", "description": "First addend"},
                "b": {"type": "number", "description": "Second addend"}
            },
            "required": ["a", "b"],
            "additionalProperties": false
        })
    }

    async fn call(&self, input: AddInput, _ctx: &ToolContext) -> Result<Vec<ToolContent>, ToolError> {
        Ok(vec![ToolContent::text(format_sum(input.a, input.b)?)])
    }
}

/// Integral sums print without a fractional part (`2 + 3` is `"5"`).
fn format_sum(a: f64, b: f64) -> Result<String, ToolError> {
    // `+ 0.0` folds negative zero into zero.
    let sum = a + b + 0.0;
    if !sum.is_finite() {
        return Err(ToolError::Internal(format!("sum of {a} and {b} is not finite")));
    }
    Ok(sum.to_string())
}
