//! Server and client configuration.
//!
//! [`ServerConfig::load`] layers an optional config file and environment
//! variables over built-in defaults, via the `config` crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server-side tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Pre-reserved capacity for the initial (empty) sequence.
    pub initial_array_size: usize,
    /// Maximum retained operation history entries before eviction.
    pub max_history_size: usize,
    /// Broadcaster tick interval, in milliseconds (serde-friendly form of
    /// `Duration`).
    pub broadcast_interval_ms: u64,
    /// Target block count for the sequence container.
    pub container_block_count: usize,
}

impl ServerConfig {
    /// The `broadcast_interval` as a `Duration`.
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    /// Load configuration layered as: these defaults, then
    /// `config/server.{toml,json,yaml}` if present, then `OTSYNC__*`
    /// environment variables.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&ServerConfig::default())?)
            .add_source(config::File::with_name("config/server").required(false))
            .add_source(config::Environment::with_prefix("OTSYNC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Reject configurations that would make the server non-functional.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_history_size == 0 {
            return Err("max_history_size must be greater than 0".to_string());
        }
        if self.container_block_count == 0 {
            return Err("container_block_count must be greater than 0".to_string());
        }
        if self.broadcast_interval_ms == 0 {
            return Err("broadcast_interval_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            initial_array_size: 0,
            max_history_size: 1000,
            broadcast_interval_ms: 500,
            container_block_count: 10,
        }
    }
}

/// Client-side configuration. Currently empty; exists as a symmetric
/// extension point alongside `ServerConfig`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig;
