//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, finite priorities)
//! - Detect duplicate accessor ids, names and overrides
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: input → Result<(), Vec<ValidationError>>
//! - Runs before config or an accessor pool is accepted into the system

use std::collections::HashSet;

use crate::accessor::AccessorSettings;
use crate::config::schema::RouterConfig;

/// A single semantic problem.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("load_sampling.interval_ms must be greater than 0")]
    ZeroSamplingInterval,

    #[error("options.operation_timeout_ms must be greater than 0")]
    ZeroOperationTimeout,

    #[error("accessor override #{0} has an empty accessor key")]
    EmptyOverrideKey(usize),

    #[error("accessor '{0}' is overridden more than once")]
    DuplicateOverride(String),

    #[error("accessor '{0}' has a non-finite priority")]
    NonFinitePriority(String),

    #[error("accessor id must not be empty")]
    EmptyAccessorId,

    #[error("accessor id '{0}' is registered more than once")]
    DuplicateAccessorId(String),

    #[error("accessor name '{0}' is used more than once")]
    DuplicateAccessorName(String),
}

/// Validate a loaded configuration.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.load_sampling.interval_ms == 0 {
        errors.push(ValidationError::ZeroSamplingInterval);
    }
    if config.options.operation_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroOperationTimeout);
    }

    let mut seen = HashSet::new();
    for (index, o) in config.accessors.iter().enumerate() {
        if o.accessor.trim().is_empty() {
            errors.push(ValidationError::EmptyOverrideKey(index));
            continue;
        }
        if !seen.insert(o.accessor.as_str()) {
            errors.push(ValidationError::DuplicateOverride(o.accessor.clone()));
        }
        if o.priority.is_some_and(|p| !p.is_finite()) {
            errors.push(ValidationError::NonFinitePriority(o.accessor.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the static settings of every registered accessor.
pub fn validate_settings<'a>(
    settings: impl IntoIterator<Item = &'a AccessorSettings>,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut ids = HashSet::new();
    let mut names = HashSet::new();

    for s in settings {
        if s.id.trim().is_empty() {
            errors.push(ValidationError::EmptyAccessorId);
        } else if !ids.insert(s.id.as_str()) {
            errors.push(ValidationError::DuplicateAccessorId(s.id.clone()));
        }
        if let Some(name) = s.name.as_deref() {
            if !names.insert(name) {
                errors.push(ValidationError::DuplicateAccessorName(name.to_string()));
            }
        }
        if !s.priority.is_finite() {
            errors.push(ValidationError::NonFinitePriority(s.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
