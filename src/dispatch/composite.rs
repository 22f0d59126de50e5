//! Composite accessor facade.
//!
//! # Responsibilities
//! - Present an ordered list of accessors as one `DataAccess`
//! - Reads: try members in order, first success wins
//! - Mutations and commits: apply to every member in order, last result wins
//! - Reject commits on read-only composites before any member is touched

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::accessor::{AccessMode, DataAccess, Query, Record};
use crate::dispatch::attempt::{Attempt, BoxFuture};
use crate::error::{AccessError, AccessResult};
use crate::observability::metrics;

/// How the members of a composite relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redundancy {
    /// Single accessor or unordered selection.
    Default,
    /// Interchangeable replicas ordered by effective priority.
    Mirroring,
    /// Horizontal partitions ordered by group and partition.
    Striping,
    /// Mirroring and striping composites combined.
    Composite,
}

impl Redundancy {
    pub fn as_str(self) -> &'static str {
        match self {
            Redundancy::Default => "default",
            Redundancy::Mirroring => "mirroring",
            Redundancy::Striping => "striping",
            Redundancy::Composite => "composite",
        }
    }
}

impl fmt::Display for Redundancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered group of accessors behind the `DataAccess` surface.
pub struct CompositeAccessor {
    id: String,
    members: Vec<Arc<dyn DataAccess>>,
    access: AccessMode,
    redundancy: Redundancy,
    timeout: Option<Duration>,
}

impl CompositeAccessor {
    pub fn new(members: Vec<Arc<dyn DataAccess>>, access: AccessMode, redundancy: Redundancy) -> Self {
        let ids: Vec<&str> = members.iter().map(|m| m.id()).collect();
        let id = format!("{}[{}]", redundancy, ids.join(","));
        Self {
            id,
            members,
            access,
            redundancy,
            timeout: None,
        }
    }

    /// Facade over exactly one accessor.
    pub fn single(member: Arc<dyn DataAccess>, access: AccessMode) -> Self {
        Self::new(vec![member], access, Redundancy::Default)
    }

    /// Bound every member call by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn members(&self) -> &[Arc<dyn DataAccess>] {
        &self.members
    }

    /// Member ids in dispatch order.
    pub fn member_ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id()).collect()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.access
    }

    pub fn redundancy(&self) -> Redundancy {
        self.redundancy
    }

    fn empty_error(&self) -> AccessError {
        AccessError::Unsupported(format!("composite '{}' has no members", self.id))
    }

    /// Try each member in order until one succeeds.
    ///
    /// A lone member's error is returned as is. Otherwise the error of the
    /// last attempt is wrapped in `AllReplicasFailed`.
    async fn fallback<'a, T, F>(
        &'a self,
        operation: &'static str,
        cancel: &'a CancellationToken,
        call: F,
    ) -> AccessResult<T>
    where
        T: Send,
        F: Fn(&'a dyn DataAccess) -> BoxFuture<'a, AccessResult<T>> + Send + Sync,
    {
        tracing::debug!(composite = %self.id, operation, "Dispatching read");
        let mut attempts = 0;
        let mut last = None;

        for member in &self.members {
            attempts += 1;
            let attempt = Attempt::run(member.id(), call(member.as_ref()), self.timeout, cancel).await;
            match attempt {
                Attempt::Success(value) => {
                    metrics::record_dispatch(operation, self.redundancy.as_str(), true);
                    return Ok(value);
                }
                Attempt::Failed(e) if e.is_cancelled() => {
                    metrics::record_dispatch(operation, self.redundancy.as_str(), false);
                    return Err(e);
                }
                Attempt::Failed(e) => {
                    tracing::warn!(
                        composite = %self.id,
                        accessor = %member.id(),
                        operation,
                        error = %e,
                        "Read failed, trying next accessor"
                    );
                    metrics::record_fallback(member.id());
                    last = Some(e);
                }
            }
        }

        metrics::record_dispatch(operation, self.redundancy.as_str(), false);
        match last {
            Some(last) if attempts == 1 => Err(last),
            Some(last) => Err(AccessError::AllReplicasFailed {
                attempts,
                last: Box::new(last),
            }),
            None => Err(self.empty_error()),
        }
    }

    /// Apply to every member in order and return the last member's result.
    ///
    /// Stops at the first failure. Members already applied are reported in
    /// `PartialFanOut`; a failure on the first member is returned as is.
    async fn fan_out<'a, T, F>(
        &'a self,
        operation: &'static str,
        cancel: &'a CancellationToken,
        call: F,
    ) -> AccessResult<T>
    where
        T: Send,
        F: Fn(&'a dyn DataAccess) -> BoxFuture<'a, AccessResult<T>> + Send + Sync,
    {
        tracing::debug!(composite = %self.id, operation, "Dispatching mutation");
        let mut applied: Vec<String> = Vec::with_capacity(self.members.len());
        let mut last = None;

        for member in &self.members {
            let attempt = Attempt::run(member.id(), call(member.as_ref()), self.timeout, cancel).await;
            match attempt {
                Attempt::Success(value) => {
                    applied.push(member.id().to_string());
                    last = Some(value);
                }
                Attempt::Failed(e) => {
                    tracing::error!(
                        composite = %self.id,
                        accessor = %member.id(),
                        operation,
                        applied = ?applied,
                        error = %e,
                        "Fan-out aborted"
                    );
                    metrics::record_fanout_aborted(member.id());
                    metrics::record_dispatch(operation, self.redundancy.as_str(), false);
                    if applied.is_empty() {
                        return Err(e);
                    }
                    return Err(AccessError::PartialFanOut {
                        applied,
                        failed: member.id().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        metrics::record_dispatch(operation, self.redundancy.as_str(), last.is_some());
        last.ok_or_else(|| self.empty_error())
    }
}

impl fmt::Debug for CompositeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAccessor")
            .field("id", &self.id)
            .field("access", &self.access)
            .field("redundancy", &self.redundancy)
            .field("members", &self.member_ids())
            .finish()
    }
}

#[async_trait]
impl DataAccess for CompositeAccessor {
    fn id(&self) -> &str {
        &self.id
    }

    async fn exists(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<bool> {
        self.fallback("exists", cancel, |m| m.exists(query, cancel)).await
    }

    async fn count(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<u64> {
        self.fallback("count", cancel, |m| m.count(query, cancel)).await
    }

    async fn find(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Option<Record>> {
        self.fallback("find", cancel, |m| m.find(query, cancel)).await
    }

    async fn find_list(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Vec<Record>> {
        self.fallback("find_list", cancel, |m| m.find_list(query, cancel)).await
    }

    async fn add(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.fan_out("add", cancel, |m| m.add(collection, record.clone(), cancel))
            .await
    }

    async fn add_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.fan_out("add_range", cancel, |m| {
            m.add_range(collection, records.clone(), cancel)
        })
        .await
    }

    async fn attach(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.fan_out("attach", cancel, |m| m.attach(collection, record.clone(), cancel))
            .await
    }

    async fn attach_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.fan_out("attach_range", cancel, |m| {
            m.attach_range(collection, records.clone(), cancel)
        })
        .await
    }

    async fn remove(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.fan_out("remove", cancel, |m| m.remove(collection, record.clone(), cancel))
            .await
    }

    async fn remove_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.fan_out("remove_range", cancel, |m| {
            m.remove_range(collection, records.clone(), cancel)
        })
        .await
    }

    async fn update(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record> {
        self.fan_out("update", cancel, |m| m.update(collection, record.clone(), cancel))
            .await
    }

    async fn update_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>> {
        self.fan_out("update_range", cancel, |m| {
            m.update_range(collection, records.clone(), cancel)
        })
        .await
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> AccessResult<usize> {
        if !self.access.allows_write() {
            tracing::warn!(composite = %self.id, "Commit rejected on read-only composite");
            metrics::record_dispatch("save_changes", self.redundancy.as_str(), false);
            return Err(AccessError::Unsupported(format!(
                "save_changes on read-only composite '{}'",
                self.id
            )));
        }
        self.fan_out("save_changes", cancel, |m| m.save_changes(cancel)).await
    }

    /// Dispose every member, even after failures.
    async fn dispose(&self) -> AccessResult<()> {
        let mut errors = Vec::new();
        for member in &self.members {
            if let Err(e) = member.dispose().await {
                tracing::warn!(composite = %self.id, accessor = %member.id(), error = %e, "Dispose failed");
                errors.push(e);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AccessError::Dispose(errors))
        }
    }
}
