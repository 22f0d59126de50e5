//! Runtime inputs for shard key evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Supplies the runtime state a sharding strategy is evaluated against.
pub trait ShardValueSource: Send + Sync {
    /// Current time, used by date strategies.
    fn now(&self) -> DateTime<Utc>;

    /// Value of a named key, used by key strategies.
    fn key(&self, name: &str) -> Option<String>;
}

/// Wall clock plus a concurrent map of keys that callers update at runtime.
#[derive(Debug, Clone, Default)]
pub struct SystemShardValues {
    keys: Arc<DashMap<String, String>>,
}

impl SystemShardValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a key, e.g. the tenant of the current deployment.
    pub fn set_key(&self, name: impl Into<String>, value: impl Into<String>) {
        self.keys.insert(name.into(), value.into());
    }

    pub fn clear_key(&self, name: &str) {
        self.keys.remove(name);
    }
}

impl ShardValueSource for SystemShardValues {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn key(&self, name: &str) -> Option<String> {
        self.keys.get(name).map(|r| r.value().clone())
    }
}

/// Frozen inputs. Makes shard targets reproducible.
#[derive(Debug, Clone)]
pub struct FixedShardValues {
    now: DateTime<Utc>,
    keys: HashMap<String, String>,
}

impl FixedShardValues {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            keys: HashMap::new(),
        }
    }

    pub fn with_key(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.keys.insert(name.into(), value.into());
        self
    }
}

impl ShardValueSource for FixedShardValues {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn key(&self, name: &str) -> Option<String> {
        self.keys.get(name).cloned()
    }
}
