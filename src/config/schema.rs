//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the accessor router.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Dispatch toggles.
    pub options: RouterOptions,

    /// Device load sampling settings.
    pub load_sampling: LoadSamplingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Per-accessor overrides, keyed by accessor id or name.
    pub accessors: Vec<AccessorOverride>,
}

impl RouterConfig {
    /// Find the override for an accessor by id, falling back to its name.
    pub fn override_for(&self, id: &str, name: Option<&str>) -> Option<&AccessorOverride> {
        self.accessors
            .iter()
            .find(|o| o.accessor == id)
            .or_else(|| {
                name.and_then(|name| self.accessors.iter().find(|o| o.accessor == name))
            })
    }
}

/// Runtime toggles consulted on every dispatch pass.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RouterOptions {
    /// Apply sharding descriptors before dispatch.
    pub auto_sharding: bool,

    /// Migrate stores created by sharding or initialization.
    pub auto_migration: bool,

    /// Reorder mirrors by sampled device load.
    pub auto_load: bool,

    /// Lower utilization means a better replica (weights 1/2/3 for network/processor/memory).
    pub smaller_load_is_better: bool,

    /// Lower priority values are tried first.
    pub smaller_priority_first: bool,

    /// Encoding used when neither the accessor nor an override sets one.
    pub default_encoding: String,

    /// Per-attempt timeout in milliseconds. No timeout when unset.
    pub operation_timeout_ms: Option<u64>,
}

impl RouterOptions {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            auto_sharding: true,
            auto_migration: true,
            auto_load: false,
            smaller_load_is_better: true,
            smaller_priority_first: true,
            default_encoding: "utf-8".to_string(),
            operation_timeout_ms: None,
        }
    }
}

/// Device load sampling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoadSamplingConfig {
    /// Minimum interval between two samples of the same host, in milliseconds.
    pub interval_ms: u64,

    /// Host names the built-in sampler answers for (the local machine).
    pub local_hosts: Vec<String>,

    /// Link capacity used to turn network throughput into a utilization ratio.
    pub network_capacity_bytes_per_sec: u64,
}

impl LoadSamplingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for LoadSamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            local_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            network_capacity_bytes_per_sec: 125_000_000, // 1 Gbit/s
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// Configuration-side override of an accessor's reported settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccessorOverride {
    /// Accessor id or name this override applies to.
    pub accessor: String,

    #[serde(default)]
    pub priority: Option<f64>,

    #[serde(default)]
    pub loader_host: Option<String>,

    #[serde(default)]
    pub encoding: Option<String>,
}
