//! CLI command implementations for the Tidepool MCP server.

pub mod keys;
pub mod serve;
pub mod token;
pub mod tools;
