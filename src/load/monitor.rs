//! Sampling cadence enforcement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::load::{DeviceLoadSampler, DeviceUsage};
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct Sampled {
    at: Instant,
    /// `None` when the last attempt failed.
    usage: Option<DeviceUsage>,
}

/// Caches samples per host so no host is sampled more often than `interval`.
pub struct LoadMonitor {
    sampler: Arc<dyn DeviceLoadSampler>,
    interval: Duration,
    hosts: DashMap<String, Arc<Mutex<Option<Sampled>>>>,
}

impl LoadMonitor {
    pub fn new(sampler: Arc<dyn DeviceLoadSampler>, interval: Duration) -> Self {
        Self {
            sampler,
            interval,
            hosts: DashMap::new(),
        }
    }

    /// Current usage of `host`, sampling it only if the cached sample is stale.
    ///
    /// A failed sample is cached like a successful one and yields `None` until
    /// the interval elapses. The exported load gauge is scored with
    /// `smaller_is_better`, the same weighting the caller orders by.
    pub async fn usage(&self, host: &str, smaller_is_better: bool) -> Option<DeviceUsage> {
        let slot = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();
        let mut slot = slot.lock().await;

        if let Some(sampled) = slot.as_ref() {
            if sampled.at.elapsed() < self.interval {
                return sampled.usage.clone();
            }
        }

        let usage = match self.sampler.sample(host).await {
            Ok(usage) => {
                metrics::record_device_load(host, usage.load_score(smaller_is_better));
                Some(usage)
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "Device load sampling failed, assuming no load");
                None
            }
        };
        *slot = Some(Sampled {
            at: Instant::now(),
            usage: usage.clone(),
        });
        usage
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl std::fmt::Debug for LoadMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadMonitor")
            .field("interval", &self.interval)
            .field("hosts", &self.hosts.len())
            .finish()
    }
}
