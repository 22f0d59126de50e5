//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Whatever metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - Structured fields (accessor id, criteria, pool size) on every decision
//! - Metrics are cheap no-ops until a recorder is installed
//! - The library never installs a global subscriber on its own

pub mod logging;
pub mod metrics;
