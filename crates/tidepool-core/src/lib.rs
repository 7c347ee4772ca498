//! # tidepool-core
//!
//! Configuration types shared by the Tidepool crates.
//!
//! A deployment is described by a single YAML file (`tidepool.yaml` by
//! default) that deserializes into [`TidepoolConfig`]. Every section has
//! serde defaults, so an empty file is a valid configuration.

// Configuration types shared across all Tidepool crates
pub mod config;

pub use config::{
    BackendConfig, BiscuitConfig, ConfigError, DefaultCredentials, McpConfig, ResolvedCredentials,
    StoreConfig, TidepoolConfig, Transport,
};
