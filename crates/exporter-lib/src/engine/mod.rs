//! Aggregation and forecasting engine
//!
//! Turns raw backend samples into per-pod records and derived gauge values:
//! - Series indexing for curve fitting
//! - Average, trimmed average and polynomial forecast estimators
//! - Unit conversion into megabytes and millicores
//! - Per-pod record merging across all source queries
//! - Comparative metrics (difference, percentage, deviation)

mod builder;
mod derived;
mod estimators;
mod series;
mod units;

pub use builder::{build_pod_records, ResourceSources, SourceResults};
pub use derived::{
    derive_all, derive_metrics, deviation_from_forecast, difference, historic_difference,
    historic_percentage, percentage, REQUEST_UNSET_SENTINEL,
};
pub use estimators::{
    average, polynomial_forecast, trimmed_average, EstimateError, EstimatorSelection,
    PolynomialForecast, MIN_FIT_POINTS, POLYNOMIAL_DEGREE, TRIM_FRACTION,
};
pub use series::{index_series, IndexedSeries};
pub use units::{bytes_to_megabytes, cores_to_millicores, BYTES_PER_MEGABYTE, MILLICORES_PER_CORE};
