//! Exporter library for pod resource usage signals
//!
//! This crate provides the core functionality for:
//! - Querying pod usage and requests from a Prometheus backend
//! - Merging query results into per-pod records
//! - Average, trimmed average and polynomial usage forecasts
//! - Deriving comparative gauge values and publishing them
//! - Health checks and observability

pub mod cycle;
pub mod engine;
pub mod health;
pub mod models;
pub mod observability;
pub mod query;

pub use cycle::{CycleRunner, CycleRunnerBuilder, GaugePublisher, PipelineConfig};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
pub use query::{PrometheusClient, QueryError, QuerySource};
