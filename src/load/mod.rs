//! Device load subsystem.
//!
//! # Data Flow
//! ```text
//! Mirroring strategy needs an order:
//!     → monitor.rs (cached sample per loader host, respects cadence)
//!     → sampler.rs (sysinfo or a caller-supplied sampler)
//!     → usage.rs (DeviceUsage → load score)
//!     → effective_priority = configured priority ± load score (toward the back)
//! ```
//!
//! # Design Decisions
//! - Load only reorders; it never changes an accessor's stored priority
//! - Each host is sampled at most once per interval, failures included
//! - A host that cannot be sampled counts as unloaded

pub mod monitor;
pub mod sampler;
pub mod usage;

pub use monitor::LoadMonitor;
pub use sampler::{DeviceLoadSampler, SamplerError, SystemLoadSampler};
pub use usage::{effective_priority, DeviceUsage};
