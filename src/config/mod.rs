//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → AccessorContext (overrides baked into descriptors, options swapped atomically)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watch channel (latest valid config only)
//!     → AccessorContext::follow_config → apply_config swaps RouterOptions
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Accessor overrides apply at resolve time; only options reload at runtime

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AccessorOverride, LoadSamplingConfig, LogFormat, ObservabilityConfig, RouterConfig,
    RouterOptions,
};
pub use validation::{validate_config, validate_settings, ValidationError};
pub use watcher::{ConfigWatch, ConfigWatcher};
