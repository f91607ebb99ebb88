//! Per-pod record merging
//!
//! Folds the result sets of every source query in a cycle into one
//! [`PodRecord`] per pod. A pod is created the first time any source
//! mentions it; a field stays `None` unless its own source returned a value
//! for that pod.

use super::estimators::{average, polynomial_forecast, trimmed_average, EstimatorSelection};
use super::series::index_series;
use crate::models::{
    InstantEntry, InstantResult, PodRecord, RangeResult, ResourceFields, ResourceKind, SeriesEntry,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Raw query results for one resource kind
#[derive(Debug, Clone, Default)]
pub struct ResourceSources {
    pub usage: InstantResult,
    pub request: InstantResult,
    pub usage_historic: InstantResult,
    pub request_historic: InstantResult,
    pub trend: RangeResult,
}

/// Raw query results for one evaluation cycle
#[derive(Debug, Clone, Default)]
pub struct SourceResults {
    pub memory: ResourceSources,
    pub cpu: ResourceSources,
}

impl SourceResults {
    pub fn resource(&self, kind: ResourceKind) -> &ResourceSources {
        match kind {
            ResourceKind::Memory => &self.memory,
            ResourceKind::Cpu => &self.cpu,
        }
    }

    pub fn resource_mut(&mut self, kind: ResourceKind) -> &mut ResourceSources {
        match kind {
            ResourceKind::Memory => &mut self.memory,
            ResourceKind::Cpu => &mut self.cpu,
        }
    }
}

type PodRecords = BTreeMap<String, PodRecord>;
type FieldSetter = fn(&mut ResourceFields, f64);

/// Merge all source results of a cycle into records keyed by pod name.
///
/// Sources are applied in a fixed order, and each one only writes its own
/// field, so the merged content does not depend on that order.
pub fn build_pod_records(sources: &SourceResults, estimators: EstimatorSelection) -> PodRecords {
    ResourceKind::ALL
        .iter()
        .fold(PodRecords::new(), |records, &kind| {
            let src = sources.resource(kind);
            let instant_sources: [(&InstantResult, FieldSetter); 4] = [
                (&src.usage, |f, v| f.usage = Some(v)),
                (&src.request, |f, v| f.request = Some(v)),
                (&src.usage_historic, |f, v| f.usage_historic = Some(v)),
                (&src.request_historic, |f, v| f.request_historic = Some(v)),
            ];

            let records = instant_sources
                .into_iter()
                .fold(records, |records, (entries, set)| {
                    merge_instant(records, kind, entries, set)
                });

            merge_trend(records, kind, &src.trend, estimators)
        })
}

fn fields_for<'a>(records: &'a mut PodRecords, pod: &str, kind: ResourceKind) -> &'a mut ResourceFields {
    records
        .entry(pod.to_string())
        .or_insert_with(|| PodRecord::new(pod))
        .resource_mut(kind)
}

fn merge_instant(
    records: PodRecords,
    kind: ResourceKind,
    entries: &[InstantEntry],
    set: FieldSetter,
) -> PodRecords {
    entries.iter().fold(records, |mut records, entry| {
        let fields = fields_for(&mut records, &entry.pod, kind);
        if let Some(raw) = entry.sample.value {
            set(fields, kind.to_canonical(raw));
        }
        records
    })
}

fn merge_trend(
    records: PodRecords,
    kind: ResourceKind,
    entries: &[SeriesEntry],
    estimators: EstimatorSelection,
) -> PodRecords {
    if !estimators.any() {
        return records;
    }

    entries.iter().fold(records, |mut records, entry| {
        let fields = fields_for(&mut records, &entry.pod, kind);

        if estimators.average {
            fields.expected_avg = Some(kind.to_canonical(average(&entry.samples)));
        }
        if estimators.trimmed_average {
            fields.expected_trimmed_avg = Some(kind.to_canonical(trimmed_average(&entry.samples)));
        }
        if estimators.polynomial {
            let indexed = index_series(&entry.samples);
            let raw = match polynomial_forecast(&indexed.points, indexed.next_index()) {
                Ok(forecast) => forecast.value,
                Err(e) => {
                    debug!(
                        pod = %entry.pod,
                        resource = %kind,
                        error = %e,
                        "Polynomial forecast unavailable"
                    );
                    f64::NAN
                }
            };
            fields.expected_polynomial = Some(kind.to_canonical(raw));
        }

        records
    })
}
