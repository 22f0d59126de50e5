//! Read-only routing snapshot of an accessor.

use crate::accessor::{AccessMode, AccessorSettings, DispatchingMode};
use crate::config::AccessorOverride;
use crate::sharding::ShardingDescriptor;

/// Snapshot of the attributes that drive dispatch decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessorDescriptor {
    pub id: String,
    pub name: Option<String>,
    pub group: i32,
    pub partition: i32,
    pub access: AccessMode,
    pub dispatching: DispatchingMode,
    /// Configured priority, before any load adjustment.
    pub priority: f64,
    pub sharding: Option<ShardingDescriptor>,
    pub loader_host: Option<String>,
    pub encoding: String,
}

impl AccessorDescriptor {
    /// Layer configuration overrides and global defaults onto the accessor's own settings.
    pub fn compute(
        settings: &AccessorSettings,
        overrides: Option<&AccessorOverride>,
        default_encoding: &str,
    ) -> Self {
        let priority = overrides
            .and_then(|o| o.priority)
            .unwrap_or(settings.priority);
        let loader_host = overrides
            .and_then(|o| o.loader_host.clone())
            .or_else(|| settings.loader_host.clone());
        let encoding = overrides
            .and_then(|o| o.encoding.clone())
            .or_else(|| settings.encoding.clone())
            .unwrap_or_else(|| default_encoding.to_string());

        Self {
            id: settings.id.clone(),
            name: settings.name.clone(),
            group: settings.group,
            partition: settings.partition,
            access: settings.access,
            dispatching: settings.dispatching,
            priority,
            sharding: settings.sharding.clone(),
            loader_host,
            encoding,
        }
    }

    /// Returns true if `name` identifies this accessor by name or id.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name) || self.id == name
    }
}
