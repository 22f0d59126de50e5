//! Static per-accessor routing configuration.

use serde::{Deserialize, Serialize};

use crate::accessor::{AccessMode, DispatchingMode};
use crate::sharding::ShardingDescriptor;

/// Routing-relevant configuration an accessor reports about itself.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccessorSettings {
    /// Unique accessor identity.
    pub id: String,

    /// Optional name used by named specifications. Globally unique when set.
    #[serde(default)]
    pub name: Option<String>,

    /// Accessors in the same group are functionally interchangeable.
    #[serde(default)]
    pub group: i32,

    /// Partition index, meaningful only under striping.
    #[serde(default)]
    pub partition: i32,

    #[serde(default)]
    pub access: AccessMode,

    #[serde(default)]
    pub dispatching: DispatchingMode,

    /// Lower sorts first.
    #[serde(default)]
    pub priority: f64,

    #[serde(default)]
    pub sharding: Option<ShardingDescriptor>,

    /// Host whose device load is added to the priority when load sampling is on.
    #[serde(default)]
    pub loader_host: Option<String>,

    /// Text encoding of the store. Falls back to the router default.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl AccessorSettings {
    /// Create settings with defaults for everything but the id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            group: 0,
            partition: 0,
            access: AccessMode::ReadWrite,
            dispatching: DispatchingMode::Default,
            priority: 0.0,
            sharding: None,
            loader_host: None,
            encoding: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_group(mut self, group: i32) -> Self {
        self.group = group;
        self
    }

    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_access(mut self, access: AccessMode) -> Self {
        self.access = access;
        self
    }

    pub fn with_dispatching(mut self, dispatching: DispatchingMode) -> Self {
        self.dispatching = dispatching;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sharding(mut self, sharding: ShardingDescriptor) -> Self {
        self.sharding = Some(sharding);
        self
    }

    pub fn with_loader_host(mut self, host: impl Into<String>) -> Self {
        self.loader_host = Some(host.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::ShardingStrategy;

    #[test]
    fn test_deserialize_minimal() {
        let settings: AccessorSettings = toml::from_str(r#"id = "orders-primary""#).unwrap();
        assert_eq!(settings, AccessorSettings::new("orders-primary"));
    }

    #[test]
    fn test_deserialize_full() {
        let settings: AccessorSettings = toml::from_str(
            r#"
            id = "orders-2"
            name = "orders"
            group = 3
            partition = 1
            access = "read"
            dispatching = "striping"
            priority = 2.5
            loader_host = "db-2"

            [sharding]
            strategy = { kind = "month" }
            "#,
        )
        .unwrap();

        assert_eq!(settings.access, AccessMode::Read);
        assert_eq!(settings.dispatching, DispatchingMode::Striping);
        assert_eq!(settings.group, 3);
        assert_eq!(settings.partition, 1);
        assert_eq!(settings.loader_host.as_deref(), Some("db-2"));
        let sharding = settings.sharding.unwrap();
        assert_eq!(sharding.strategy, ShardingStrategy::Month);
        assert_eq!(sharding.separator, "_");
    }
}
