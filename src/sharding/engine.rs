//! Runtime shard redirection.
//!
//! # Responsibilities
//! - Evaluate an accessor's sharding descriptor against current inputs
//! - Swap the accessor's connection when the shard target moved
//! - Ensure each shard store exists, once per target
//! - Serialize redirects of the same accessor

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::accessor::Accessor;
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::sharding::{ShardValueSource, ShardingDescriptor};

/// Resolved physical location for one accessor.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardTarget {
    pub descriptor: ShardingDescriptor,
    pub connection: String,
}

/// Result of one sharding pass over an accessor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShardOutcome {
    /// The accessor's connection was swapped during this pass.
    pub sharded: bool,
    /// The target had never been seen before and its store was ensured.
    pub new_store: bool,
    /// Resolved target, `None` when the accessor is not sharded.
    pub target: Option<ShardTarget>,
}

#[derive(Debug)]
struct ShardState {
    /// Connection the accessor had before its first redirect.
    base: String,
    /// Targets whose store has already been ensured.
    ensured: HashSet<String>,
}

/// Applies sharding descriptors to accessors.
pub struct ShardingEngine {
    values: Arc<dyn ShardValueSource>,
    states: DashMap<String, Arc<Mutex<ShardState>>>,
}

impl ShardingEngine {
    pub fn new(values: Arc<dyn ShardValueSource>) -> Self {
        Self {
            values,
            states: DashMap::new(),
        }
    }

    /// Redirect `accessor` to the shard selected by `descriptor`.
    ///
    /// No-op when `descriptor` is `None`. Calling it again with unchanged inputs
    /// neither swaps the connection nor re-creates the store.
    pub async fn shard_database(
        &self,
        accessor: &dyn Accessor,
        descriptor: Option<&ShardingDescriptor>,
        cancel: &CancellationToken,
    ) -> RouterResult<ShardOutcome> {
        let Some(descriptor) = descriptor else {
            return Ok(ShardOutcome::default());
        };
        let id = accessor.id().to_string();

        let state = self
            .states
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ShardState {
                    base: accessor.connection(),
                    ensured: HashSet::new(),
                }))
            })
            .clone();
        let mut state = state.lock().await;

        let candidate = descriptor
            .target_connection(&state.base, self.values.as_ref())
            .map_err(|e| RouterError::Sharding {
                accessor: id.clone(),
                message: e.to_string(),
            })?;
        let target = Some(ShardTarget {
            descriptor: descriptor.clone(),
            connection: candidate.clone(),
        });

        let current = accessor.connection();
        let sharded = current != candidate;
        if sharded {
            accessor.change_connection(&candidate)?;
            tracing::info!(
                accessor = %id,
                from = %current,
                to = %candidate,
                "Accessor redirected to shard"
            );
            metrics::record_shard_redirect(&id);
        }

        let new_store = !state.ensured.contains(&candidate);
        if new_store {
            match accessor.try_create_database(cancel).await {
                Ok(created) => {
                    tracing::debug!(accessor = %id, target = %candidate, created, "Shard store ensured");
                }
                Err(e) => {
                    // Leave the accessor on a store that exists
                    if sharded {
                        if let Err(restore) = accessor.change_connection(&current) {
                            tracing::error!(
                                accessor = %id,
                                target = %candidate,
                                restore_to = %current,
                                error = %restore,
                                "Failed to restore connection after shard creation failed"
                            );
                        }
                    }
                    return Err(e.into());
                }
            }
            state.ensured.insert(candidate);
        }

        Ok(ShardOutcome {
            sharded,
            new_store,
            target,
        })
    }
}

impl std::fmt::Debug for ShardingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardingEngine")
            .field("tracked_accessors", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{AccessorSettings, MemoryAccessor};
    use crate::sharding::{FixedShardValues, ShardingStrategy};
    use chrono::{TimeZone, Utc};

    fn engine_at(month: u32) -> ShardingEngine {
        let now = Utc.with_ymd_and_hms(2026, month, 1, 0, 0, 0).unwrap();
        ShardingEngine::new(Arc::new(FixedShardValues::new(now)))
    }

    #[tokio::test]
    async fn test_unsharded_accessor_is_untouched() {
        let engine = engine_at(10);
        let acc = MemoryAccessor::new(AccessorSettings::new("a1"), "memory://orders");
        let outcome = engine
            .shard_database(&acc, None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, ShardOutcome::default());
        assert_eq!(acc.connection(), "memory://orders");
    }

    #[tokio::test]
    async fn test_redirect_is_idempotent() {
        let engine = engine_at(10);
        let descriptor = ShardingDescriptor::new(ShardingStrategy::Month);
        let acc = MemoryAccessor::new(AccessorSettings::new("a1"), "memory://db/orders");
        let cancel = CancellationToken::new();

        let first = engine.shard_database(&acc, Some(&descriptor), &cancel).await.unwrap();
        assert!(first.sharded);
        assert!(first.new_store);
        assert_eq!(acc.connection(), "memory://db/orders_202610");
        assert!(acc.has_store("memory://db/orders_202610"));

        let second = engine.shard_database(&acc, Some(&descriptor), &cancel).await.unwrap();
        assert!(!second.sharded);
        assert!(!second.new_store);
        assert_eq!(second.target, first.target);
    }

    #[tokio::test]
    async fn test_missing_key_is_reported() {
        let engine = engine_at(10);
        let descriptor = ShardingDescriptor::new(ShardingStrategy::Key { name: "tenant".into() });
        let acc = MemoryAccessor::new(AccessorSettings::new("a1"), "memory://db/orders");

        let err = engine
            .shard_database(&acc, Some(&descriptor), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::Sharding { .. }));
        assert_eq!(acc.connection(), "memory://db/orders");
    }

    #[tokio::test]
    async fn test_failed_creation_restores_connection() {
        let engine = engine_at(10);
        let descriptor = ShardingDescriptor::new(ShardingStrategy::Year);
        let acc = MemoryAccessor::new(AccessorSettings::new("a1"), "memory://db/orders");
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(engine.shard_database(&acc, Some(&descriptor), &cancel).await.is_err());
        assert_eq!(acc.connection(), "memory://db/orders");

        // Retry with a live token creates the store
        let outcome = engine
            .shard_database(&acc, Some(&descriptor), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.sharded && outcome.new_store);
    }

    #[tokio::test]
    async fn test_concurrent_redirects_create_once() {
        let engine = engine_at(10);
        let descriptor = ShardingDescriptor::new(ShardingStrategy::Month);
        let acc = MemoryAccessor::new(AccessorSettings::new("a1"), "memory://db/orders");
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(
            engine.shard_database(&acc, Some(&descriptor), &cancel),
            engine.shard_database(&acc, Some(&descriptor), &cancel),
        );
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.new_store as u8 + second.new_store as u8, 1);
        assert_eq!(first.sharded as u8 + second.sharded as u8, 1);
        assert_eq!(first.target, second.target);
        assert_eq!(acc.connection(), "memory://db/orders_202610");
    }
}
