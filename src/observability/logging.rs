//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for hosts that want the default setup
//! - Configure log level from the environment first, then from config
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, text format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

pub use tracing_subscriber::util::TryInitError;

/// Install a global subscriber built from `config`.
///
/// `RUST_LOG` wins over `config.log_level` when set. Fails if a global
/// subscriber is already installed.
pub fn try_init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("accessor_router={}", config.log_level)));

    match config.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}
