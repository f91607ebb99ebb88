//! Metrics backend access
//!
//! This module provides the query side of an evaluation cycle:
//! - The [`QuerySource`] trait the cycle runner depends on
//! - A Prometheus HTTP API implementation
//! - The fixed PromQL expressions for usage and requests

mod client;
mod error;

pub use client::{PrometheusClient, INSTANT_QUERY_PATH, RANGE_QUERY_PATH};
pub use error::QueryError;

use crate::models::{InstantResult, RangeResult, ResourceKind};
use std::time::Duration;

pub use async_trait::async_trait;

pub const MEMORY_USAGE_QUERY: &str = "sum(container_memory_working_set_bytes) by(pod)";
pub const CPU_USAGE_QUERY: &str = "sum(rate(container_cpu_usage_seconds_total[120s])) by(pod)";
pub const MEMORY_REQUEST_QUERY: &str =
    r#"sum(kube_pod_container_resource_requests{resource="memory"}) by(pod)"#;
pub const CPU_REQUEST_QUERY: &str =
    r#"sum(kube_pod_container_resource_requests{resource="cpu"}) by(pod)"#;

/// Usage expression for a resource; also used for the trend range query
pub fn usage_query(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Memory => MEMORY_USAGE_QUERY,
        ResourceKind::Cpu => CPU_USAGE_QUERY,
    }
}

pub fn request_query(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Memory => MEMORY_REQUEST_QUERY,
        ResourceKind::Cpu => CPU_REQUEST_QUERY,
    }
}

/// Time range of a range query, in Unix seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeWindow {
    pub start: f64,
    pub end: f64,
    pub step: Duration,
}

impl RangeWindow {
    /// Window of length `window` ending at `end`
    pub fn ending_at(end: f64, window: Duration, step: Duration) -> Self {
        Self {
            start: end - window.as_secs_f64(),
            end,
            step,
        }
    }
}

/// Trait for metrics backend implementations
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// Evaluate `query` at a single instant
    async fn instant(&self, query: &str, time: f64) -> Result<InstantResult, QueryError>;

    /// Evaluate `query` over a time range
    async fn range(&self, query: &str, window: RangeWindow) -> Result<RangeResult, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries_per_kind() {
        assert_eq!(usage_query(ResourceKind::Memory), MEMORY_USAGE_QUERY);
        assert_eq!(usage_query(ResourceKind::Cpu), CPU_USAGE_QUERY);
        assert!(request_query(ResourceKind::Memory).contains(r#"resource="memory""#));
        assert!(request_query(ResourceKind::Cpu).contains(r#"resource="cpu""#));
    }

    #[test]
    fn test_range_window_ending_at() {
        let window = RangeWindow::ending_at(
            90_000.0,
            Duration::from_secs(86_400),
            Duration::from_secs(360),
        );
        assert_eq!(window.start, 3_600.0);
        assert_eq!(window.end, 90_000.0);
        assert_eq!(window.step, Duration::from_secs(360));
    }
}
