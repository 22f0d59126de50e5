//! Dispatch strategy abstraction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::accessor::{AccessMode, Accessor, AccessorDescriptor, DataAccess};
use crate::dispatch::{CompositeAccessor, Redundancy};
use crate::sharding::ShardTarget;

/// One selected accessor, ready to be placed in a composite.
#[derive(Clone)]
pub struct DispatchMember {
    pub accessor: Arc<dyn Accessor>,
    pub descriptor: AccessorDescriptor,
    /// Shard the accessor was redirected to during this pass, if any.
    pub shard: Option<ShardTarget>,
}

impl DispatchMember {
    pub fn new(accessor: Arc<dyn Accessor>, descriptor: AccessorDescriptor) -> Self {
        Self {
            accessor,
            descriptor,
            shard: None,
        }
    }

    pub fn with_shard(mut self, shard: Option<ShardTarget>) -> Self {
        self.shard = shard;
        self
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

impl std::fmt::Debug for DispatchMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchMember")
            .field("id", &self.descriptor.id)
            .field("shard", &self.shard.as_ref().map(|s| &s.connection))
            .finish()
    }
}

/// Arranges a set of accessors into a composite.
///
/// Strategies only decide order; the composite owns the call semantics.
#[async_trait]
pub trait DispatchStrategy: Send + Sync {
    fn redundancy(&self) -> Redundancy;

    /// Order `members` for dispatch.
    async fn arrange(&self, members: Vec<DispatchMember>) -> Vec<DispatchMember>;

    /// Arrange `members` and wrap them in a composite.
    async fn compose(
        &self,
        members: Vec<DispatchMember>,
        access: AccessMode,
        timeout: Option<Duration>,
    ) -> CompositeAccessor {
        let arranged = self.arrange(members).await;
        let accessors: Vec<Arc<dyn DataAccess>> = arranged
            .into_iter()
            .map(|m| m.accessor as Arc<dyn DataAccess>)
            .collect();
        CompositeAccessor::new(accessors, access, self.redundancy()).with_timeout(timeout)
    }
}

/// Keeps the selection order.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

#[async_trait]
impl DispatchStrategy for DefaultStrategy {
    fn redundancy(&self) -> Redundancy {
        Redundancy::Default
    }

    async fn arrange(&self, members: Vec<DispatchMember>) -> Vec<DispatchMember> {
        members
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accessor::{AccessorSettings, MemoryAccessor};

    pub(crate) fn member(settings: AccessorSettings) -> DispatchMember {
        let descriptor = AccessorDescriptor::compute(&settings, None, "utf-8");
        let connection = format!("memory://{}", settings.id);
        DispatchMember::new(Arc::new(MemoryAccessor::new(settings, connection)), descriptor)
    }

    pub(crate) fn ids(members: &[DispatchMember]) -> Vec<&str> {
        members.iter().map(|m| m.id()).collect()
    }

    #[tokio::test]
    async fn test_default_keeps_order() {
        let members = vec![
            member(AccessorSettings::new("b").with_priority(1.0)),
            member(AccessorSettings::new("a").with_priority(0.0)),
        ];
        let composite = DefaultStrategy
            .compose(members, AccessMode::ReadWrite, None)
            .await;
        assert_eq!(composite.member_ids(), vec!["b", "a"]);
        assert_eq!(composite.redundancy(), Redundancy::Default);
    }
}
