//! Sharding descriptors and shard target derivation.
//!
//! # Responsibilities
//! - Describe the shard key bound to an accessor
//! - Compute the shard suffix from runtime inputs
//! - Rewrite a base connection string into the shard-specific one

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::sharding::ShardValueSource;

/// Connection-string keys that name the database, checked in order.
const DATABASE_KEYS: [&str; 3] = ["database", "initial catalog", "data source"];

/// How the shard suffix is derived.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShardingStrategy {
    /// One store per UTC year (`2026`).
    Year,
    /// One store per UTC month (`202610`).
    Month,
    /// One store per UTC day (`20261015`).
    Day,
    /// One store per value of a runtime key, e.g. a tenant id.
    Key { name: String },
}

/// Shard key and strategy bound to one accessor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShardingDescriptor {
    pub strategy: ShardingStrategy,

    /// Placed between the base database name and the suffix.
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_separator() -> String {
    "_".to_string()
}

/// Errors deriving a shard target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShardingError {
    #[error("shard key '{0}' has no value")]
    MissingKey(String),

    #[error("shard key '{name}' has invalid value '{value}'")]
    InvalidKey { name: String, value: String },

    #[error("connection '{0}' does not name a database")]
    NoDatabase(String),
}

impl ShardingDescriptor {
    pub fn new(strategy: ShardingStrategy) -> Self {
        Self {
            strategy,
            separator: default_separator(),
        }
    }

    /// Compute the suffix for the current runtime inputs.
    pub fn suffix(&self, values: &dyn ShardValueSource) -> Result<String, ShardingError> {
        match &self.strategy {
            ShardingStrategy::Year => Ok(format_date(values.now(), "%Y")),
            ShardingStrategy::Month => Ok(format_date(values.now(), "%Y%m")),
            ShardingStrategy::Day => Ok(format_date(values.now(), "%Y%m%d")),
            ShardingStrategy::Key { name } => {
                let value = values
                    .key(name)
                    .ok_or_else(|| ShardingError::MissingKey(name.clone()))?;
                let valid = !value.is_empty()
                    && value
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                if !valid {
                    return Err(ShardingError::InvalidKey {
                        name: name.clone(),
                        value,
                    });
                }
                Ok(value)
            }
        }
    }

    /// Derive the shard connection from the unsharded `base` connection.
    pub fn target_connection(
        &self,
        base: &str,
        values: &dyn ShardValueSource,
    ) -> Result<String, ShardingError> {
        let suffix = self.suffix(values)?;
        shard_connection(base, &format!("{}{}", self.separator, suffix))
    }
}

fn format_date(now: DateTime<Utc>, pattern: &str) -> String {
    now.format(pattern).to_string()
}

/// Append `suffix` to the database named by `base`.
///
/// URL connections get it on the last path segment, `key=value;` connections on
/// the database key, anything else is treated as a file path.
pub fn shard_connection(base: &str, suffix: &str) -> Result<String, ShardingError> {
    let parsed = if has_drive_prefix(base) {
        None
    } else {
        Url::parse(base).ok()
    };
    if let Some(mut url) = parsed {
        if !url.cannot_be_a_base() {
            let last = url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
                .ok_or_else(|| ShardingError::NoDatabase(base.to_string()))?;
            let sharded = suffix_name(&last, suffix);
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().pop().push(&sharded);
            }
            return Ok(url.to_string());
        }
    }

    if base.contains('=') {
        return shard_key_value(base, suffix);
    }

    if base.trim().is_empty() {
        return Err(ShardingError::NoDatabase(base.to_string()));
    }
    Ok(suffix_path(base, suffix))
}

/// `C:/...` and `C:\\...` are paths, not URLs with a one-letter scheme.
fn has_drive_prefix(base: &str) -> bool {
    matches!(
        base.as_bytes(),
        [letter, b':', b'/' | b'\\', ..] if letter.is_ascii_alphabetic()
    )
}

fn shard_key_value(base: &str, suffix: &str) -> Result<String, ShardingError> {
    let mut parts: Vec<(String, String)> = base
        .split(';')
        .filter(|part| !part.trim().is_empty())
        .map(|part| match part.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (part.trim().to_string(), String::new()),
        })
        .collect();

    let index = DATABASE_KEYS
        .iter()
        .find_map(|key| parts.iter().position(|(k, _)| k.eq_ignore_ascii_case(key)))
        .ok_or_else(|| ShardingError::NoDatabase(base.to_string()))?;

    let (key, value) = &parts[index];
    let sharded = if key.eq_ignore_ascii_case("data source") {
        suffix_path(value, suffix)
    } else {
        suffix_name(value, suffix)
    };
    parts[index].1 = sharded;

    Ok(parts
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";"))
}

/// Insert the suffix before the extension of the final path component.
fn suffix_path(path: &str, suffix: &str) -> String {
    let split = path.rfind(['/', '\\']).map(|i| i + 1).unwrap_or(0);
    let (dir, file) = path.split_at(split);
    format!("{}{}", dir, suffix_name(file, suffix))
}

fn suffix_name(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{}{}", name, suffix),
    }
}
