//! Accessor abstraction.
//!
//! # Data Flow
//! ```text
//! AccessorSettings (static, per accessor)
//!     → descriptor.rs (settings + config overrides → AccessorDescriptor)
//!     → consulted by specifications, sharding and dispatch strategies
//!
//! Operation call:
//!     DataAccess method (exists/find/add/...)
//!     → concrete accessor (memory.rs or an external driver)
//!     → AccessResult<T>
//! ```
//!
//! # Design Decisions
//! - `DataAccess` is the operation surface shared by single accessors and composites
//! - `Accessor` adds identity, configuration and connection management
//! - Every async operation takes a cancellation token
//! - Records are schemaless JSON values; the router never interprets them

pub mod descriptor;
pub mod memory;
pub mod settings;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::error::AccessResult;

pub use descriptor::AccessorDescriptor;
pub use memory::MemoryAccessor;
pub use settings::AccessorSettings;

/// A single stored entity.
pub type Record = Value;

/// Which operations an accessor (or composite) accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl AccessMode {
    pub fn allows_read(self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

/// How an accessor relates to the other accessors of its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchingMode {
    /// No redundancy declared. Treated as a mirror by mode-aware specifications.
    #[default]
    Default,
    /// Interchangeable replica.
    Mirroring,
    /// Disjoint horizontal partition.
    Striping,
}

/// Equality filter over a collection.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Query {
    pub collection: String,
    #[serde(default)]
    pub filter: Map<String, Value>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    /// Query every record of `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Map::new(),
            limit: None,
        }
    }

    /// Require `field` to equal `value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if every filter field is present on the record with an equal value.
    pub fn matches(&self, record: &Record) -> bool {
        self.filter
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Operation surface shared by accessors and composites.
///
/// Mutations are staged until [`DataAccess::save_changes`] commits them.
#[async_trait]
pub trait DataAccess: Send + Sync + fmt::Debug {
    /// Identity used in logs, metrics and errors.
    fn id(&self) -> &str;

    async fn exists(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<bool>;

    async fn count(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<u64>;

    async fn find(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Option<Record>>;

    async fn find_list(&self, query: &Query, cancel: &CancellationToken) -> AccessResult<Vec<Record>>;

    async fn add(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record>;

    async fn add_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>>;

    /// Start tracking a record that already exists in the store.
    async fn attach(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record>;

    async fn attach_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>>;

    async fn remove(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record>;

    async fn remove_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>>;

    async fn update(&self, collection: &str, record: Record, cancel: &CancellationToken) -> AccessResult<Record>;

    async fn update_range(
        &self,
        collection: &str,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> AccessResult<Vec<Record>>;

    /// Commit staged mutations. Returns the number of affected records.
    async fn save_changes(&self, cancel: &CancellationToken) -> AccessResult<usize>;

    /// Release the underlying session.
    async fn dispose(&self) -> AccessResult<()>;
}

/// A handle to one physical database session.
#[async_trait]
pub trait Accessor: DataAccess {
    /// Static routing configuration reported by the accessor.
    fn settings(&self) -> &AccessorSettings;

    /// Current connection target.
    fn connection(&self) -> String;

    /// Point the accessor at a different physical store.
    fn change_connection(&self, connection: &str) -> AccessResult<()>;

    /// Create the store behind the current connection if it does not exist.
    /// Returns true if a store was created.
    async fn try_create_database(&self, cancel: &CancellationToken) -> AccessResult<bool>;

    /// Apply pending schema changes to the current store. Must be idempotent.
    async fn migrate(&self, cancel: &CancellationToken) -> AccessResult<()>;
}
