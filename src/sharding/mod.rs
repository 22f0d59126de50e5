//! Sharding subsystem.
//!
//! # Data Flow
//! ```text
//! AccessorDescriptor.sharding (optional)
//!     → values.rs (current time, runtime keys)
//!     → descriptor.rs (suffix → shard connection string)
//!     → engine.rs (swap connection, ensure store once)
//!     → ShardOutcome { sharded, new_store, target }
//! ```
//!
//! # Design Decisions
//! - Shard targets are re-evaluated on every dispatch pass (dates and keys change)
//! - The unsharded base connection is captured on first sight and never mutated
//! - One async mutex per accessor serializes concurrent redirects
//! - New stores are reported so the caller can migrate them

pub mod descriptor;
pub mod engine;
pub mod values;

pub use descriptor::{shard_connection, ShardingDescriptor, ShardingError, ShardingStrategy};
pub use engine::{ShardOutcome, ShardTarget, ShardingEngine};
pub use values::{FixedShardValues, ShardValueSource, SystemShardValues};
