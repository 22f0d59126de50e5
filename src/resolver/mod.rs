//! Accessor resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Host application registers accessors
//!     → registry.rs (validate settings, attach config overrides)
//!     → pool.rs (immutable AccessorPool, descriptors computed on first use)
//!     → shared via Arc by every AccessorContext call
//! ```
//!
//! # Design Decisions
//! - Resolution happens once per context; an empty pool is fatal
//! - The pool is never mutated after resolution, so reads need no locking
//! - Registration order is the enumeration order used for fan-out

pub mod pool;
pub mod registry;

pub use pool::{AccessorPool, PooledAccessor};
pub use registry::{AccessorRegistry, AccessorResolver};
