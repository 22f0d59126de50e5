//! Device load samplers.
//!
//! # Responsibilities
//! - Define the sampling contract (host → utilization)
//! - Sample the local machine with sysinfo

use std::time::Instant;

use async_trait::async_trait;
use sysinfo::{Disks, Networks, System};
use tokio::sync::Mutex;

use crate::config::LoadSamplingConfig;
use crate::load::DeviceUsage;

/// Errors while sampling a host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplerError {
    #[error("host '{0}' cannot be sampled")]
    UnknownHost(String),

    #[error("sampling '{host}' failed: {message}")]
    Failed { host: String, message: String },
}

/// Samples processor, memory, network and disk utilization of a named host.
#[async_trait]
pub trait DeviceLoadSampler: Send + Sync {
    async fn sample(&self, host: &str) -> Result<DeviceUsage, SamplerError>;
}

struct SystemState {
    system: System,
    networks: Networks,
    disks: Disks,
    last_network_refresh: Instant,
}

/// Samples the machine the router runs on.
///
/// Answers for the configured local host aliases and the machine's own host
/// name; any other host is an [`SamplerError::UnknownHost`].
pub struct SystemLoadSampler {
    hosts: Vec<String>,
    network_capacity: f64,
    state: Mutex<SystemState>,
}

impl SystemLoadSampler {
    pub fn new(config: &LoadSamplingConfig) -> Self {
        let mut hosts = config.local_hosts.clone();
        if let Some(name) = System::host_name() {
            hosts.push(name);
        }

        Self {
            hosts,
            network_capacity: config.network_capacity_bytes_per_sec.max(1) as f64,
            state: Mutex::new(SystemState {
                system: System::new(),
                networks: Networks::new_with_refreshed_list(),
                disks: Disks::new_with_refreshed_list(),
                last_network_refresh: Instant::now(),
            }),
        }
    }

    fn serves(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
    }
}

#[async_trait]
impl DeviceLoadSampler for SystemLoadSampler {
    async fn sample(&self, host: &str) -> Result<DeviceUsage, SamplerError> {
        if !self.serves(host) {
            return Err(SamplerError::UnknownHost(host.to_string()));
        }

        let mut state = self.state.lock().await;

        // CPU usage is a delta between two refreshes
        state.system.refresh_cpu();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        state.system.refresh_cpu();
        state.system.refresh_memory();
        let processor = state.system.global_cpu_info().cpu_usage() as f64;

        let total_memory = state.system.total_memory();
        let memory = if total_memory == 0 {
            0.0
        } else {
            state.system.used_memory() as f64 / total_memory as f64 * 100.0
        };

        let elapsed = state.last_network_refresh.elapsed().as_secs_f64().max(0.001);
        state.networks.refresh();
        state.last_network_refresh = Instant::now();
        let bytes: u64 = state
            .networks
            .iter()
            .map(|(_, data)| data.received() + data.transmitted())
            .sum();
        let network = bytes as f64 / elapsed / self.network_capacity * 100.0;

        state.disks.refresh();
        let (total, available) = state
            .disks
            .list()
            .iter()
            .fold((0u64, 0u64), |(t, a), d| (t + d.total_space(), a + d.available_space()));
        let disk = if total == 0 {
            0.0
        } else {
            total.saturating_sub(available) as f64 / total as f64 * 100.0
        };

        let usage = DeviceUsage::new(host, processor, memory, network, disk);
        tracing::debug!(
            host = %host,
            processor = usage.processor,
            memory = usage.memory,
            network = usage.network,
            disk = usage.disk,
            "Sampled device usage"
        );
        Ok(usage)
    }
}

impl std::fmt::Debug for SystemLoadSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLoadSampler")
            .field("hosts", &self.hosts)
            .field("network_capacity", &self.network_capacity)
            .finish()
    }
}
