//! Mirroring strategy: replicas ordered by effective priority.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatch::{DispatchMember, DispatchStrategy, Redundancy};
use crate::load::{effective_priority, DeviceUsage, LoadMonitor};

/// Orders interchangeable replicas so the preferred one is tried first.
///
/// Without a load monitor the order is by configured priority alone. With one,
/// each replica's current load score first moves it toward the back of the
/// order, whichever direction priorities sort in. Ties keep selection order.
pub struct MirroringStrategy {
    load: Option<Arc<LoadMonitor>>,
    smaller_priority_first: bool,
    smaller_load_is_better: bool,
}

impl MirroringStrategy {
    pub fn new(smaller_priority_first: bool, smaller_load_is_better: bool) -> Self {
        Self {
            load: None,
            smaller_priority_first,
            smaller_load_is_better,
        }
    }

    /// Adjust priorities by the load of each replica's host.
    pub fn with_load(mut self, load: Arc<LoadMonitor>) -> Self {
        self.load = Some(load);
        self
    }

    async fn usages(&self, members: &[DispatchMember]) -> HashMap<String, DeviceUsage> {
        let mut usages = HashMap::new();
        let Some(load) = &self.load else {
            return usages;
        };
        for host in members.iter().filter_map(|m| m.descriptor.loader_host.as_deref()) {
            if usages.contains_key(host) {
                continue;
            }
            if let Some(usage) = load.usage(host, self.smaller_load_is_better).await {
                usages.insert(host.to_string(), usage);
            }
        }
        usages
    }
}

#[async_trait]
impl DispatchStrategy for MirroringStrategy {
    fn redundancy(&self) -> Redundancy {
        Redundancy::Mirroring
    }

    async fn arrange(&self, members: Vec<DispatchMember>) -> Vec<DispatchMember> {
        let usages = self.usages(&members).await;

        let mut ranked: Vec<(f64, DispatchMember)> = members
            .into_iter()
            .map(|m| {
                let usage = m
                    .descriptor
                    .loader_host
                    .as_deref()
                    .and_then(|host| usages.get(host));
                let priority = effective_priority(
                    &m.descriptor,
                    usage,
                    self.smaller_load_is_better,
                    self.smaller_priority_first,
                );
                (priority, m)
            })
            .collect();

        // Stable, so equal priorities keep selection order
        if self.smaller_priority_first {
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
        } else {
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        }

        tracing::debug!(
            order = ?ranked.iter().map(|(p, m)| (m.id(), *p)).collect::<Vec<_>>(),
            load_aware = self.load.is_some(),
            "Mirrors ordered"
        );
        ranked.into_iter().map(|(_, m)| m).collect()
    }
}

impl std::fmt::Debug for MirroringStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirroringStrategy")
            .field("load_aware", &self.load.is_some())
            .field("smaller_priority_first", &self.smaller_priority_first)
            .field("smaller_load_is_better", &self.smaller_load_is_better)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::AccessorSettings;
    use crate::dispatch::strategy::tests::{ids, member};
    use crate::load::{DeviceLoadSampler, SamplerError};
    use std::time::Duration;

    struct NetworkOnly(HashMap<String, f64>);

    #[async_trait]
    impl DeviceLoadSampler for NetworkOnly {
        async fn sample(&self, host: &str) -> Result<DeviceUsage, SamplerError> {
            self.0
                .get(host)
                .map(|network| DeviceUsage::new(host, 0.0, 0.0, *network, 0.0))
                .ok_or_else(|| SamplerError::UnknownHost(host.to_string()))
        }
    }

    fn replicas() -> Vec<DispatchMember> {
        vec![
            member(AccessorSettings::new("a1").with_priority(3.0).with_loader_host("h1")),
            member(AccessorSettings::new("a2").with_priority(1.0).with_loader_host("h2")),
            member(AccessorSettings::new("a3").with_priority(2.0).with_loader_host("h3")),
        ]
    }

    #[tokio::test]
    async fn test_priority_order() {
        let arranged = MirroringStrategy::new(true, true).arrange(replicas()).await;
        assert_eq!(ids(&arranged), vec!["a2", "a3", "a1"]);

        let arranged = MirroringStrategy::new(false, true).arrange(replicas()).await;
        assert_eq!(ids(&arranged), vec!["a1", "a3", "a2"]);
    }

    #[tokio::test]
    async fn test_ties_keep_selection_order() {
        let members = vec![
            member(AccessorSettings::new("x")),
            member(AccessorSettings::new("y")),
            member(AccessorSettings::new("z")),
        ];
        let arranged = MirroringStrategy::new(true, true).arrange(members).await;
        assert_eq!(ids(&arranged), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_load_reorders_without_touching_priority() {
        let sampler = NetworkOnly(HashMap::from([("h2".to_string(), 10.0)]));
        let monitor = Arc::new(LoadMonitor::new(Arc::new(sampler), Duration::from_secs(60)));

        let arranged = MirroringStrategy::new(true, true)
            .with_load(monitor)
            .arrange(replicas())
            .await;
        // a2: 1 + 10, a3: 2, a1: 3 (h1 and h3 cannot be sampled)
        assert_eq!(ids(&arranged), vec!["a3", "a1", "a2"]);
        assert_eq!(arranged[2].descriptor.priority, 1.0);
    }

    #[tokio::test]
    async fn test_load_sinks_under_descending_priority() {
        let sampler = NetworkOnly(HashMap::from([
            ("h1".to_string(), 50.0),
            ("h2".to_string(), 0.0),
            ("h3".to_string(), 0.0),
        ]));
        let monitor = Arc::new(LoadMonitor::new(Arc::new(sampler), Duration::from_secs(60)));

        let arranged = MirroringStrategy::new(false, true)
            .with_load(monitor)
            .arrange(replicas())
            .await;
        // a1: 3 - 50, a2: 1, a3: 2, highest first
        assert_eq!(ids(&arranged), vec!["a3", "a2", "a1"]);
        assert_eq!(arranged[2].descriptor.priority, 3.0);
    }
}
