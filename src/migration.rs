//! Schema migration.
//!
//! # Responsibilities
//! - Apply pending schema changes to one or more accessors
//! - Run after initialization and after sharding lands on a new store
//!
//! # Design Decisions
//! - Synchronous from the caller's view: dispatch waits for migration to finish
//! - No internal retry; failures surface to the caller verbatim
//! - Implementations must tolerate running against an already migrated store

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::accessor::Accessor;
use crate::error::AccessResult;

/// Applies schema migrations.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn migrate(&self, accessor: &dyn Accessor, cancel: &CancellationToken) -> AccessResult<()>;

    /// Migrate every accessor in order, stopping at the first failure.
    async fn migrate_all(
        &self,
        accessors: &[Arc<dyn Accessor>],
        cancel: &CancellationToken,
    ) -> AccessResult<()> {
        for accessor in accessors {
            self.migrate(accessor.as_ref(), cancel).await?;
        }
        Ok(())
    }
}

/// Delegates to the accessor's own [`Accessor::migrate`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessorMigrator;

#[async_trait]
impl Migrator for AccessorMigrator {
    async fn migrate(&self, accessor: &dyn Accessor, cancel: &CancellationToken) -> AccessResult<()> {
        tracing::info!(accessor = %accessor.id(), target = %accessor.connection(), "Migrating accessor");
        accessor.migrate(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{AccessorSettings, MemoryAccessor, memory::MEMORY_SCHEMA_VERSION};

    #[tokio::test]
    async fn test_migrate_all() {
        let a1 = Arc::new(MemoryAccessor::new(AccessorSettings::new("a1"), "memory://a1"));
        let a2 = Arc::new(MemoryAccessor::new(AccessorSettings::new("a2"), "memory://a2"));
        let accessors: Vec<Arc<dyn Accessor>> = vec![a1.clone(), a2.clone()];

        AccessorMigrator
            .migrate_all(&accessors, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(a1.schema_version(), Some(MEMORY_SCHEMA_VERSION));
        assert_eq!(a2.schema_version(), Some(MEMORY_SCHEMA_VERSION));
    }
}
