//! Gauge publication
//!
//! Writes derived metrics into the `memory_metrics` and `cpu_metrics` gauge
//! families, labelled by `type` and `pod`. Label pairs published in the
//! previous cycle but missing from the current one are removed so that
//! vanished pods stop being exported.

use crate::models::{DerivedMetric, MetricTag, ResourceKind};
use prometheus::{register_gauge_vec, GaugeVec, Opts, Registry};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

pub const MEMORY_FAMILY: &str = "memory_metrics";
pub const CPU_FAMILY: &str = "cpu_metrics";

const MEMORY_HELP: &str = "Gauge for monitoring memory usage and resource requests.";
const CPU_HELP: &str = "Gauge for monitoring CPU usage and resource requests.";
const LABELS: &[&str] = &["type", "pod"];

/// Gauge families registered in the default registry
static GLOBAL_GAUGES: OnceLock<PodGauges> = OnceLock::new();

#[derive(Clone)]
struct PodGauges {
    memory: GaugeVec,
    cpu: GaugeVec,
}

impl PodGauges {
    fn global() -> Self {
        GLOBAL_GAUGES
            .get_or_init(|| Self {
                memory: register_gauge_vec!(MEMORY_FAMILY, MEMORY_HELP, LABELS)
                    .expect("Failed to register memory_metrics"),
                cpu: register_gauge_vec!(CPU_FAMILY, CPU_HELP, LABELS)
                    .expect("Failed to register cpu_metrics"),
            })
            .clone()
    }

    fn registered_in(registry: &Registry) -> prometheus::Result<Self> {
        let memory = GaugeVec::new(Opts::new(MEMORY_FAMILY, MEMORY_HELP), LABELS)?;
        let cpu = GaugeVec::new(Opts::new(CPU_FAMILY, CPU_HELP), LABELS)?;
        registry.register(Box::new(memory.clone()))?;
        registry.register(Box::new(cpu.clone()))?;
        Ok(Self { memory, cpu })
    }

    fn family(&self, kind: ResourceKind) -> &GaugeVec {
        match kind {
            ResourceKind::Memory => &self.memory,
            ResourceKind::Cpu => &self.cpu,
        }
    }
}

/// Outcome of one publication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub set: usize,
    pub removed: usize,
}

type LabelKey = (ResourceKind, MetricTag, String);

/// Publishes derived metrics as gauge values
pub struct GaugePublisher {
    gauges: PodGauges,
    published: HashSet<LabelKey>,
}

impl Default for GaugePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugePublisher {
    /// Publisher backed by the process-wide default registry
    pub fn new() -> Self {
        Self {
            gauges: PodGauges::global(),
            published: HashSet::new(),
        }
    }

    /// Publisher backed by its own registry
    pub fn with_registry(registry: &Registry) -> prometheus::Result<Self> {
        Ok(Self {
            gauges: PodGauges::registered_in(registry)?,
            published: HashSet::new(),
        })
    }

    /// Replace the exported values with `metrics`.
    ///
    /// `NaN` values are published unchanged.
    pub fn publish(&mut self, metrics: &[DerivedMetric]) -> PublishStats {
        let mut current = HashSet::with_capacity(metrics.len());

        for metric in metrics {
            self.gauges
                .family(metric.kind)
                .with_label_values(&[metric.tag.as_str(), metric.pod.as_str()])
                .set(metric.value);
            current.insert((metric.kind, metric.tag, metric.pod.clone()));
        }

        let mut removed = 0;
        for (kind, tag, pod) in self.published.difference(&current) {
            match self
                .gauges
                .family(*kind)
                .remove_label_values(&[tag.as_str(), pod.as_str()])
            {
                Ok(()) => removed += 1,
                Err(e) => debug!(pod = %pod, tag = %tag, error = %e, "Stale gauge already gone"),
            }
        }

        let set = current.len();
        self.published = current;
        PublishStats { set, removed }
    }

    /// Number of label pairs currently exported
    pub fn published_len(&self) -> usize {
        self.published.len()
    }
}
