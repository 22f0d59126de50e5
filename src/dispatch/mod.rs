//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Selected accessors (DispatchMember)
//!     → strategy.rs / mirroring.rs / striping.rs (order members)
//!     → composite.rs (CompositeAccessor)
//!         - reads: attempt.rs per member, first success wins
//!         - mutations, commits: every member in order, last result wins
//!     → caller sees one DataAccess
//! ```
//!
//! # Design Decisions
//! - Members are called sequentially, never concurrently
//! - A read chain keeps only the last error; earlier ones are logged
//! - A fan-out stops at the first failure and reports what was applied
//! - Cancellation interrupts the in-flight call and ends the chain

pub mod attempt;
pub mod composite;
pub mod mirroring;
pub mod strategy;
pub mod striping;

pub use attempt::Attempt;
pub use composite::{CompositeAccessor, Redundancy};
pub use mirroring::MirroringStrategy;
pub use strategy::{DefaultStrategy, DispatchMember, DispatchStrategy};
pub use striping::StripingStrategy;
