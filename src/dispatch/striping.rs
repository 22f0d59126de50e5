//! Striping strategy: partitions dispatched in pool order.

use async_trait::async_trait;

use crate::dispatch::{DispatchMember, DispatchStrategy, Redundancy};

/// Groups horizontal partitions without reordering them.
///
/// Members arrive in the order they were registered in the pool and are
/// written in that order. Group and partition numbers are carried on the
/// descriptor for callers that select by them.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripingStrategy;

#[async_trait]
impl DispatchStrategy for StripingStrategy {
    fn redundancy(&self) -> Redundancy {
        Redundancy::Striping
    }

    async fn arrange(&self, members: Vec<DispatchMember>) -> Vec<DispatchMember> {
        members
    }
}
