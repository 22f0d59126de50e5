//! Device utilization samples and load scoring.

use crate::accessor::AccessorDescriptor;

/// Utilization of one host. Every ratio is a percentage in `[0, 100]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUsage {
    pub host: String,
    pub processor: f64,
    pub memory: f64,
    pub network: f64,
    pub disk: f64,
}

impl DeviceUsage {
    /// Build a sample, clamping every ratio into `[0, 100]`.
    pub fn new(host: impl Into<String>, processor: f64, memory: f64, network: f64, disk: f64) -> Self {
        Self {
            host: host.into(),
            processor: clamp_ratio(processor),
            memory: clamp_ratio(memory),
            network: clamp_ratio(network),
            disk: clamp_ratio(disk),
        }
    }

    /// Reduce the sample to one comparable score.
    ///
    /// Weights network/processor/memory 1/2/3 when smaller load is better,
    /// 3/2/1 otherwise. Disk does not contribute.
    pub fn load_score(&self, smaller_is_better: bool) -> f64 {
        let (network, processor, memory) = if smaller_is_better {
            (1.0, 2.0, 3.0)
        } else {
            (3.0, 2.0, 1.0)
        };
        network * self.network + processor * self.processor + memory * self.memory
    }
}

fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Priority used for ordering: configured priority moved toward the back by the
/// current load score.
///
/// With `smaller_priority_first` the score is added, otherwise it is subtracted,
/// so a loaded host sorts later in either direction. The accessor's stored
/// priority is never modified.
pub fn effective_priority(
    descriptor: &AccessorDescriptor,
    usage: Option<&DeviceUsage>,
    smaller_load_is_better: bool,
    smaller_priority_first: bool,
) -> f64 {
    let score = usage.map_or(0.0, |u| u.load_score(smaller_load_is_better));
    if smaller_priority_first {
        descriptor.priority + score
    } else {
        descriptor.priority - score
    }
}
