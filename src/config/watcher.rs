//! Configuration hot reload.
//!
//! # Responsibilities
//! - Load the file once up front so a broken config fails at startup
//! - Reload on change and publish the latest valid config
//! - Keep the last good config when a reload fails
//!
//! # Design Decisions
//! - A `watch` channel: consumers only ever need the newest config
//! - Reloads equal to the published config are not re-announced

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::RouterConfig;

/// Watches one configuration file.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
}

/// Running watch. Updates stop when this is dropped.
pub struct ConfigWatch {
    _watcher: RecommendedWatcher,
    updates: watch::Receiver<RouterConfig>,
}

impl ConfigWatch {
    /// Receiver holding the latest valid config.
    pub fn subscribe(&self) -> watch::Receiver<RouterConfig> {
        self.updates.clone()
    }

    pub fn current(&self) -> RouterConfig {
        self.updates.borrow().clone()
    }
}

impl ConfigWatcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Interval used by polling backends.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Load the file and start watching it.
    ///
    /// Feed the subscribed receiver to [`crate::AccessorContext::follow_config`].
    pub fn start(self) -> Result<ConfigWatch, ConfigError> {
        let initial = load_config(&self.path)?;
        let (tx, rx) = watch::channel(initial);
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(path = ?path, error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                match load_config(&path) {
                    Ok(config) => {
                        let changed = tx.send_if_modified(|current| {
                            if *current == config {
                                return false;
                            }
                            *current = config;
                            true
                        });
                        tracing::info!(path = ?path, changed, "Config file reloaded");
                    }
                    Err(e) => {
                        tracing::error!(
                            path = ?path,
                            error = %e,
                            "Config reload failed, keeping current configuration"
                        );
                    }
                }
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(ConfigError::Watch)?;

        watcher
            .watch(&self.path, RecursiveMode::NonRecursive)
            .map_err(ConfigError::Watch)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(ConfigWatch {
            _watcher: watcher,
            updates: rx,
        })
    }
}
