//! `tidepool tools` - Print the tool definitions every session exposes.

use tidepool_mcp::{ToolRegistry, register_default_tools};

fn definitions_json() -> anyhow::Result<String> {
    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry)?;
    Ok(serde_json::to_string_pretty(&registry.definitions())?)
}

pub fn list() -> anyhow::Result<()> {
    println!("{}", definitions_json()?);
    Ok(())
}
