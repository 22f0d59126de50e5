//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Caller: get_read_accessors / get_write_accessors / get_accessors(spec)
//!     → specification.rs
//!         - Named: exactly one accessor, single-member composite
//!         - ByPredicate: filter the pool (identities are unique once resolved)
//!     → context.rs
//!         → ShardingEngine per accessor (migrate new stores)
//!         → mode predicates: mirrors | stripes (or one default group)
//!         → dispatch strategies → CompositeAccessor
//!     → Return: one DataAccess, or a selection error
//! ```
//!
//! # Design Decisions
//! - Specifications are a tagged type resolved by one match
//! - Selection is deterministic: pool order, then strategy order
//! - A call that selects both mirrors and stripes gets a composite of composites

pub mod context;
pub mod specification;

pub use context::{AccessorContext, AccessorContextBuilder};
pub use specification::{AccessorPredicate, AccessorSpecification, ModePredicates};
