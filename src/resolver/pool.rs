//! Resolved accessor pool.
//!
//! # Responsibilities
//! - Hold every registered accessor for the lifetime of the context
//! - Compute each accessor's descriptor once, on first use
//! - Provide ordered, lock-free read access to concurrent callers

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::accessor::{Accessor, AccessorDescriptor};
use crate::config::AccessorOverride;

/// One accessor of the pool with its lazily computed descriptor.
pub struct PooledAccessor {
    accessor: Arc<dyn Accessor>,
    overrides: Option<AccessorOverride>,
    default_encoding: String,
    descriptor: OnceLock<AccessorDescriptor>,
}

impl PooledAccessor {
    pub(crate) fn new(
        accessor: Arc<dyn Accessor>,
        overrides: Option<AccessorOverride>,
        default_encoding: String,
    ) -> Self {
        Self {
            accessor,
            overrides,
            default_encoding,
            descriptor: OnceLock::new(),
        }
    }

    pub fn accessor(&self) -> &Arc<dyn Accessor> {
        &self.accessor
    }

    pub fn id(&self) -> &str {
        self.accessor.id()
    }

    /// Routing snapshot. Computed on first call, then reused.
    pub fn descriptor(&self) -> &AccessorDescriptor {
        self.descriptor.get_or_init(|| {
            AccessorDescriptor::compute(
                self.accessor.settings(),
                self.overrides.as_ref(),
                &self.default_encoding,
            )
        })
    }
}

impl std::fmt::Debug for PooledAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledAccessor")
            .field("id", &self.id())
            .field("overridden", &self.overrides.is_some())
            .finish()
    }
}

/// Immutable, non-empty set of accessors in registration order.
#[derive(Debug)]
pub struct AccessorPool {
    accessors: Vec<PooledAccessor>,
}

impl AccessorPool {
    pub(crate) fn new(accessors: Vec<PooledAccessor>) -> Self {
        Self { accessors }
    }

    pub fn len(&self) -> usize {
        self.accessors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PooledAccessor> {
        self.accessors.iter()
    }

    pub fn get(&self, id: &str) -> Option<&PooledAccessor> {
        self.accessors.iter().find(|a| a.id() == id)
    }

    /// Accessors keyed by group, registration order kept inside each group.
    pub fn groups(&self) -> BTreeMap<i32, Vec<&PooledAccessor>> {
        let mut groups: BTreeMap<i32, Vec<&PooledAccessor>> = BTreeMap::new();
        for accessor in &self.accessors {
            groups
                .entry(accessor.descriptor().group)
                .or_default()
                .push(accessor);
        }
        groups
    }
}
