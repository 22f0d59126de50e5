//! Accessor resolution.
//!
//! # Responsibilities
//! - Collect registered accessors
//! - Validate their static configuration (unique ids and names, finite priorities)
//! - Attach configuration overrides and build the immutable pool

use std::sync::Arc;

use crate::accessor::Accessor;
use crate::config::{validate_settings, RouterConfig};
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::resolver::pool::{AccessorPool, PooledAccessor};

/// Accessors registered by the host application, in registration order.
#[derive(Default)]
pub struct AccessorRegistry {
    accessors: Vec<Arc<dyn Accessor>>,
}

impl AccessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, accessor: Arc<dyn Accessor>) -> &mut Self {
        self.accessors.push(accessor);
        self
    }

    /// Builder-style [`AccessorRegistry::register`].
    pub fn with(mut self, accessor: Arc<dyn Accessor>) -> Self {
        self.accessors.push(accessor);
        self
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }
}

impl std::fmt::Debug for AccessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.accessors.iter().map(|a| a.id()))
            .finish()
    }
}

/// Builds the accessor pool from a registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessorResolver;

impl AccessorResolver {
    /// Resolve every registered accessor into a pool.
    ///
    /// Fails with [`RouterError::Configuration`] if nothing is registered or any
    /// accessor's settings are invalid.
    pub fn resolve(&self, registry: AccessorRegistry, config: &RouterConfig) -> RouterResult<AccessorPool> {
        if registry.is_empty() {
            return Err(RouterError::Configuration(
                "no accessors registered, nothing can be dispatched".to_string(),
            ));
        }

        validate_settings(registry.accessors.iter().map(|a| a.settings())).map_err(|errors| {
            RouterError::Configuration(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        for o in &config.accessors {
            let known = registry
                .accessors
                .iter()
                .any(|a| a.id() == o.accessor || a.settings().name.as_deref() == Some(o.accessor.as_str()));
            if !known {
                tracing::warn!(accessor = %o.accessor, "Override references an unknown accessor");
            }
        }

        let default_encoding = config.options.default_encoding.clone();
        let pooled = registry
            .accessors
            .into_iter()
            .map(|accessor| {
                let settings = accessor.settings();
                let overrides = config
                    .override_for(&settings.id, settings.name.as_deref())
                    .cloned();
                PooledAccessor::new(accessor, overrides, default_encoding.clone())
            })
            .collect();
        let pool = AccessorPool::new(pooled);

        for (group, members) in pool.groups() {
            tracing::info!(
                group,
                accessors = ?members.iter().map(|m| m.id()).collect::<Vec<_>>(),
                "Accessor group resolved"
            );
        }
        metrics::record_pool_size(pool.len());

        Ok(pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{AccessorSettings, MemoryAccessor};
    use crate::config::AccessorOverride;

    fn memory(settings: AccessorSettings) -> Arc<dyn Accessor> {
        let target = format!("memory://{}", settings.id);
        Arc::new(MemoryAccessor::new(settings, target))
    }

    #[test]
    fn test_empty_registry_is_fatal() {
        let err = AccessorResolver
            .resolve(AccessorRegistry::new(), &RouterConfig::default())
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let registry = AccessorRegistry::new()
            .with(memory(AccessorSettings::new("a1").with_name("orders")))
            .with(memory(AccessorSettings::new("a2").with_name("orders")));
        let err = AccessorResolver
            .resolve(registry, &RouterConfig::default())
            .unwrap_err();
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_duplicate_ids_are_fatal() {
        let registry = AccessorRegistry::new()
            .with(memory(AccessorSettings::new("a1").with_group(1)))
            .with(memory(AccessorSettings::new("a1").with_group(2)));
        let err = AccessorResolver
            .resolve(registry, &RouterConfig::default())
            .unwrap_err();
        assert!(matches!(err, RouterError::Configuration(_)));
        assert!(err.to_string().contains("a1"));
    }

    #[test]
    fn test_overrides_reach_descriptors() {
        let registry = AccessorRegistry::new()
            .with(memory(AccessorSettings::new("a1").with_priority(5.0).with_group(1)))
            .with(memory(AccessorSettings::new("a2").with_name("replica").with_group(2)));
        let mut config = RouterConfig::default();
        config.accessors.push(AccessorOverride {
            accessor: "replica".into(),
            priority: Some(0.5),
            loader_host: Some("db-2".into()),
            encoding: None,
        });

        let pool = AccessorResolver.resolve(registry, &config).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("a1").unwrap().descriptor().priority, 5.0);
        let replica = pool.get("a2").unwrap().descriptor();
        assert_eq!(replica.priority, 0.5);
        assert_eq!(replica.loader_host.as_deref(), Some("db-2"));

        let groups = pool.groups();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    }
}
