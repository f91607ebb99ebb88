//! Comparative metrics derived from a merged pod record
//!
//! Defaults for missing inputs are explicit here rather than spread across
//! the arithmetic:
//! - a missing request counts as `0` in the differences
//! - a missing request turns the percentage into [`REQUEST_UNSET_SENTINEL`]
//! - a missing historic value counts as `0` in the historic difference

use crate::models::{DerivedMetric, MetricTag, PodRecord, ResourceFields, ResourceKind};
use std::collections::BTreeMap;

/// Percentage reported when a pod declares no request
pub const REQUEST_UNSET_SENTINEL: f64 = 999_999.0;

/// `usage - request`, with an absent request counted as zero
pub fn difference(usage: f64, request: Option<f64>) -> f64 {
    usage - request.unwrap_or(0.0)
}

/// `difference - usage_historic - request_historic`, absent terms as zero.
///
/// Both historic terms are subtracted from the current difference; this is
/// not the difference of the current and historic differences.
pub fn historic_difference(
    difference: f64,
    usage_historic: Option<f64>,
    request_historic: Option<f64>,
) -> f64 {
    difference - usage_historic.unwrap_or(0.0) - request_historic.unwrap_or(0.0)
}

/// `usage / request * 100`, or the sentinel when no request is set.
///
/// An absent usage with a present request gives `NaN`.
pub fn percentage(usage: Option<f64>, request: Option<f64>) -> f64 {
    match request {
        Some(request) => usage.unwrap_or(f64::NAN) / request * 100.0,
        None => REQUEST_UNSET_SENTINEL,
    }
}

/// `usage_historic / request_historic * 100`, `NaN` if either is absent
pub fn historic_percentage(usage_historic: Option<f64>, request_historic: Option<f64>) -> f64 {
    match (usage_historic, request_historic) {
        (Some(usage), Some(request)) => usage / request * 100.0,
        _ => f64::NAN,
    }
}

pub fn deviation_from_forecast(usage: Option<f64>, forecast: Option<f64>) -> Option<f64> {
    Some(usage? - forecast?)
}

fn derive_resource(kind: ResourceKind, pod: &str, fields: &ResourceFields) -> Vec<DerivedMetric> {
    let mut values: Vec<(MetricTag, f64)> = Vec::new();

    if let Some(usage) = fields.usage {
        let diff = difference(usage, fields.request);
        values.push((MetricTag::Usage, usage));
        values.push((MetricTag::Difference, diff));
        values.push((
            MetricTag::HistoricDifference,
            historic_difference(diff, fields.usage_historic, fields.request_historic),
        ));
    }

    let predictions = [
        (MetricTag::PredictiveAverage, fields.expected_avg),
        (MetricTag::PredictiveTrimmedAverage, fields.expected_trimmed_avg),
        (MetricTag::PredictivePolynomial, fields.expected_polynomial),
        (
            MetricTag::DeviationFromPrediction,
            deviation_from_forecast(fields.usage, fields.expected_polynomial),
        ),
    ];
    values.extend(
        predictions
            .into_iter()
            .filter_map(|(tag, value)| value.map(|v| (tag, v))),
    );

    values.push((MetricTag::Percentage, percentage(fields.usage, fields.request)));
    if fields.request.is_some() {
        values.push((
            MetricTag::HistoricPercentage,
            historic_percentage(fields.usage_historic, fields.request_historic),
        ));
    }

    values
        .into_iter()
        .map(|(tag, value)| DerivedMetric {
            kind,
            tag,
            pod: pod.to_string(),
            value,
        })
        .collect()
}

/// Derive all gauge readings for one pod, memory first then CPU
pub fn derive_metrics(record: &PodRecord) -> Vec<DerivedMetric> {
    ResourceKind::ALL
        .iter()
        .flat_map(|&kind| derive_resource(kind, &record.pod, record.resource(kind)))
        .collect()
}

/// Derive gauge readings for every pod of a cycle
pub fn derive_all(records: &BTreeMap<String, PodRecord>) -> Vec<DerivedMetric> {
    records.values().flat_map(derive_metrics).collect()
}
