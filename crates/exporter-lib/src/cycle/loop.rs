//! Evaluation cycle runner
//!
//! Runs one cycle per poll interval: fetch every source query, merge the
//! results into pod records, derive gauge values and publish them. A failed
//! query aborts the whole cycle; the next tick starts from scratch.

use super::{GaugePublisher, PipelineConfig};
use crate::engine::{build_pod_records, derive_all, ResourceSources, SourceResults};
use crate::health::{components, HealthRegistry};
use crate::models::{DerivedMetric, InstantResult, PodRecord, RangeResult, ResourceKind};
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::query::{request_query, usage_query, QueryError, QuerySource, RangeWindow};
use anyhow::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

/// Default bound on a single backend query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time between cycle triggers
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Consecutive failed cycles after which the query client is unhealthy
pub const DEFAULT_UNHEALTHY_AFTER: u32 = 5;

/// Records and gauge values computed by one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleEvaluation {
    pub records: BTreeMap<String, PodRecord>,
    pub metrics: Vec<DerivedMetric>,
}

/// Summary of a published cycle
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub pods: usize,
    pub gauges: usize,
    pub removed: usize,
    pub elapsed: Duration,
}

/// Totals of a finished evaluation loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles started, failed ones included
    pub cycles: u64,
    /// Triggers dropped because a cycle was still running
    pub skipped: u64,
}

/// Runs evaluation cycles against a query source
pub struct CycleRunner {
    source: Arc<dyn QuerySource>,
    pipeline: PipelineConfig,
    query_timeout: Duration,
    unhealthy_after: u32,
    consecutive_failures: u32,
    publisher: GaugePublisher,
    metrics: ExporterMetrics,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl CycleRunner {
    pub fn new(
        source: Arc<dyn QuerySource>,
        pipeline: PipelineConfig,
        publisher: GaugePublisher,
        health: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            pipeline,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
            consecutive_failures: 0,
            publisher,
            metrics: ExporterMetrics::new(),
            health,
            logger,
        }
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    /// Failed cycles in a row since the last published one
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| QueryError::Timeout(self.query_timeout))?
    }

    async fn instant(&self, query: &str, time: f64) -> Result<InstantResult, QueryError> {
        self.bounded(self.source.instant(query, time)).await
    }

    async fn trend(&self, query: &str, window: RangeWindow) -> Result<RangeResult, QueryError> {
        if !self.pipeline.estimators.any() {
            return Ok(Vec::new());
        }
        self.bounded(self.source.range(query, window)).await
    }

    /// Issue every source query for a cycle at `now` (Unix seconds).
    ///
    /// Queries run concurrently; the first failure cancels the rest.
    pub async fn fetch(&self, now: f64) -> Result<SourceResults, QueryError> {
        use ResourceKind::{Cpu, Memory};

        let historic = self.pipeline.historic_time(now);
        let window = self.pipeline.trend_window_ending(now);

        let (
            mem_usage,
            mem_request,
            mem_usage_historic,
            mem_request_historic,
            mem_trend,
            cpu_usage,
            cpu_request,
            cpu_usage_historic,
            cpu_request_historic,
            cpu_trend,
        ) = tokio::try_join!(
            self.instant(usage_query(Memory), now),
            self.instant(request_query(Memory), now),
            self.instant(usage_query(Memory), historic),
            self.instant(request_query(Memory), historic),
            self.trend(usage_query(Memory), window),
            self.instant(usage_query(Cpu), now),
            self.instant(request_query(Cpu), now),
            self.instant(usage_query(Cpu), historic),
            self.instant(request_query(Cpu), historic),
            self.trend(usage_query(Cpu), window),
        )?;

        Ok(SourceResults {
            memory: ResourceSources {
                usage: mem_usage,
                request: mem_request,
                usage_historic: mem_usage_historic,
                request_historic: mem_request_historic,
                trend: mem_trend,
            },
            cpu: ResourceSources {
                usage: cpu_usage,
                request: cpu_request,
                usage_historic: cpu_usage_historic,
                request_historic: cpu_request_historic,
                trend: cpu_trend,
            },
        })
    }

    /// Fetch, merge and derive without publishing
    pub async fn evaluate(&self, now: f64) -> Result<CycleEvaluation, QueryError> {
        let sources = self.fetch(now).await?;
        let records = build_pod_records(&sources, self.pipeline.estimators);
        let metrics = derive_all(&records);
        Ok(CycleEvaluation { records, metrics })
    }

    /// Run one full cycle at the current wall-clock time and publish it
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let start = Instant::now();
        let outcome = self.evaluate(unix_now()).await;
        let elapsed = start.elapsed();
        self.metrics.observe_cycle_latency(elapsed.as_secs_f64());

        match outcome {
            Ok(evaluation) => {
                let stats = self.publisher.publish(&evaluation.metrics);
                let report = CycleReport {
                    pods: evaluation.records.len(),
                    gauges: stats.set,
                    removed: stats.removed,
                    elapsed,
                };

                self.consecutive_failures = 0;
                self.metrics.record_cycle_completed(report.pods, report.gauges);
                self.health.set_healthy(components::QUERY_CLIENT).await;
                self.health.set_healthy(components::CYCLE).await;
                self.health.set_ready(true).await;
                self.logger
                    .log_cycle_complete(report.pods, report.gauges, elapsed.as_millis());

                Ok(report)
            }
            Err(e) => {
                self.metrics.inc_query_errors(e.kind());
                self.metrics.inc_cycles_failed();
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if self.consecutive_failures >= self.unhealthy_after {
                    self.health
                        .set_unhealthy(
                            components::QUERY_CLIENT,
                            format!("{} consecutive cycles failed: {}", self.consecutive_failures, e),
                        )
                        .await;
                } else {
                    self.health
                        .set_degraded(components::QUERY_CLIENT, e.to_string())
                        .await;
                }
                self.health
                    .set_degraded(components::CYCLE, "last cycle aborted")
                    .await;

                let err = anyhow::Error::new(e).context("evaluation cycle aborted");
                self.logger.log_cycle_failed(&err, elapsed.as_millis());
                Err(err)
            }
        }
    }

    /// Run cycles every `period` until shutdown.
    ///
    /// Cycles never overlap: triggers that fall inside a running cycle are
    /// skipped and counted, and the next trigger comes one full period after
    /// that cycle ends.
    pub async fn run(
        mut self,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> LoopSummary {
        info!(
            interval_secs = period.as_secs_f64(),
            trend_window_secs = self.pipeline.trend_window.as_secs(),
            "Starting evaluation loop"
        );

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = LoopSummary::default();

        loop {
            tokio::select! {
                triggered = ticker.tick() => {
                    // Failures are logged and counted inside run_cycle
                    let _ = self.run_cycle().await;
                    summary.cycles += 1;

                    let elapsed = triggered.elapsed();
                    let skipped = skipped_triggers(elapsed, period);
                    if skipped > 0 {
                        ticker.reset();
                        summary.skipped += skipped;
                        self.metrics.add_triggers_skipped(skipped);
                        self.logger.log_triggers_skipped(skipped, elapsed.as_millis());
                    }
                }
                _ = shutdown.recv() => {
                    info!(
                        cycles = summary.cycles,
                        skipped = summary.skipped,
                        "Shutting down evaluation loop"
                    );
                    break;
                }
            }
        }

        summary
    }
}

/// Number of triggers that fell inside a cycle lasting `elapsed`
fn skipped_triggers(elapsed: Duration, period: Duration) -> u64 {
    if period.is_zero() {
        return 0;
    }
    (elapsed.as_nanos() / period.as_nanos()) as u64
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Builder for creating the cycle runner
pub struct CycleRunnerBuilder {
    source: Option<Arc<dyn QuerySource>>,
    pipeline: PipelineConfig,
    query_timeout: Duration,
    unhealthy_after: u32,
    publisher: Option<GaugePublisher>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
}

impl CycleRunnerBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            pipeline: PipelineConfig::default(),
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            unhealthy_after: DEFAULT_UNHEALTHY_AFTER,
            publisher: None,
            health: None,
            logger: None,
        }
    }

    pub fn source(mut self, source: Arc<dyn QuerySource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Mark the query client unhealthy after `failures` failed cycles in a row
    pub fn unhealthy_after(mut self, failures: u32) -> Self {
        self.unhealthy_after = failures;
        self
    }

    pub fn publisher(mut self, publisher: GaugePublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<CycleRunner> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Query source is required"))?;
        self.pipeline.validate()?;
        anyhow::ensure!(self.unhealthy_after > 0, "unhealthy_after must be positive");

        let mut runner = CycleRunner::new(
            source,
            self.pipeline,
            self.publisher.unwrap_or_default(),
            self.health.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
        );
        runner.query_timeout = self.query_timeout;
        runner.unhealthy_after = self.unhealthy_after;
        Ok(runner)
    }
}

impl Default for CycleRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
