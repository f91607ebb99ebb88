//! Core data models for the resource exporter

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single observation from the metrics backend.
///
/// `value` is `None` when the backend returned no usable number for this
/// position (missing, `NaN`, `±Inf`). An absent value is never the same as
/// a measured zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in seconds
    pub timestamp: f64,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self {
            timestamp,
            value: Some(value),
        }
    }

    pub fn absent(timestamp: f64) -> Self {
        Self {
            timestamp,
            value: None,
        }
    }
}

/// One pod's value from an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantEntry {
    pub pod: String,
    pub sample: Sample,
}

/// One pod's samples from a range query, ordered by time ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEntry {
    pub pod: String,
    pub samples: Vec<Sample>,
}

pub type InstantResult = Vec<InstantEntry>;
pub type RangeResult = Vec<SeriesEntry>;

/// Resource dimension tracked per pod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Memory,
    Cpu,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Memory, ResourceKind::Cpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "cpu",
        }
    }

    /// Convert a raw backend value (bytes or cores) into the canonical unit
    /// (megabytes or millicores).
    pub fn to_canonical(&self, raw: f64) -> f64 {
        match self {
            ResourceKind::Memory => crate::engine::bytes_to_megabytes(raw),
            ResourceKind::Cpu => crate::engine::cores_to_millicores(raw),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-resource fields of a [`PodRecord`], all in canonical units.
///
/// Every field is optional: it is set only when its source query returned an
/// entry for the pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFields {
    pub usage: Option<f64>,
    pub request: Option<f64>,
    pub usage_historic: Option<f64>,
    pub request_historic: Option<f64>,
    pub expected_avg: Option<f64>,
    pub expected_trimmed_avg: Option<f64>,
    pub expected_polynomial: Option<f64>,
}

impl ResourceFields {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Merged view of one pod for a single evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub pod: String,
    pub memory: ResourceFields,
    pub cpu: ResourceFields,
}

impl PodRecord {
    pub fn new(pod: impl Into<String>) -> Self {
        Self {
            pod: pod.into(),
            memory: ResourceFields::default(),
            cpu: ResourceFields::default(),
        }
    }

    pub fn resource(&self, kind: ResourceKind) -> &ResourceFields {
        match kind {
            ResourceKind::Memory => &self.memory,
            ResourceKind::Cpu => &self.cpu,
        }
    }

    pub fn resource_mut(&mut self, kind: ResourceKind) -> &mut ResourceFields {
        match kind {
            ResourceKind::Memory => &mut self.memory,
            ResourceKind::Cpu => &mut self.cpu,
        }
    }
}

/// Label value of the `type` label on the exported gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricTag {
    Usage,
    Difference,
    HistoricDifference,
    PredictiveAverage,
    PredictiveTrimmedAverage,
    PredictivePolynomial,
    DeviationFromPrediction,
    Percentage,
    HistoricPercentage,
}

impl MetricTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricTag::Usage => "usage",
            MetricTag::Difference => "difference_between_usage_and_request",
            MetricTag::HistoricDifference => "historic_difference_between_usage_and_request",
            MetricTag::PredictiveAverage => "predictive_value(average)",
            MetricTag::PredictiveTrimmedAverage => "predictive_value(outlier_avg)",
            MetricTag::PredictivePolynomial => "predictive_value(polynomial_regression)",
            MetricTag::DeviationFromPrediction => "deviation_from_prediction",
            MetricTag::Percentage => "percentage_of_usage_and_request",
            MetricTag::HistoricPercentage => "historic_percentage_of_usage_and_request",
        }
    }
}

impl fmt::Display for MetricTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One gauge reading handed to the exposition layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetric {
    pub kind: ResourceKind,
    pub tag: MetricTag,
    pub pod: String,
    pub value: f64,
}
