//! Evaluation cycle orchestration
//!
//! This module ties the query source, the engine and the gauge families
//! together. It runs cycles on a fixed interval without overlap, and
//! publishes each completed cycle's derived metrics.

mod r#loop;
mod pipeline;
mod publisher;


pub use pipeline::{PipelineConfig, MAX_POINTS_PER_SERIES};
pub use publisher::{GaugePublisher, PublishStats, CPU_FAMILY, MEMORY_FAMILY};
pub use r#loop::{
    CycleEvaluation, CycleReport, CycleRunner, CycleRunnerBuilder, LoopSummary,
    DEFAULT_POLL_INTERVAL, DEFAULT_QUERY_TIMEOUT, DEFAULT_UNHEALTHY_AFTER,
};
