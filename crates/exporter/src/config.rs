//! Exporter configuration

use anyhow::{ensure, Context, Result};
use exporter_lib::engine::EstimatorSelection;
use exporter_lib::PipelineConfig;
use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables read by [`ExporterConfig::load`]
pub const ENV_PREFIX: &str = "EXPORTER";

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Base URL of the Prometheus-compatible metrics backend
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Port serving /metrics, /healthz and /readyz
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between evaluation cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Bound on a single backend query, in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Length of the trend window in seconds
    #[serde(default = "default_trend_window")]
    pub trend_window_secs: u64,

    /// Resolution of the trend range query in seconds
    #[serde(default = "default_trend_step")]
    pub trend_step_secs: u64,

    /// Age of the historic usage/request snapshot in seconds
    #[serde(default = "default_historic_offset")]
    pub historic_offset_secs: u64,

    /// Failed cycles in a row before the query client reports unhealthy
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after_failures: u32,

    #[serde(default = "default_enabled")]
    pub enable_average: bool,

    #[serde(default = "default_enabled")]
    pub enable_trimmed_average: bool,

    #[serde(default = "default_enabled")]
    pub enable_polynomial: bool,
}

fn default_api_url() -> String {
    std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:9090".to_string())
}

fn default_port() -> u16 {
    3000
}

fn default_poll_interval() -> u64 {
    exporter_lib::cycle::DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_query_timeout() -> u64 {
    exporter_lib::cycle::DEFAULT_QUERY_TIMEOUT.as_secs()
}

fn default_unhealthy_after() -> u32 {
    exporter_lib::cycle::DEFAULT_UNHEALTHY_AFTER
}

fn default_trend_window() -> u64 {
    86_400
}

fn default_trend_step() -> u64 {
    360
}

fn default_historic_offset() -> u64 {
    1_800
}

fn default_enabled() -> bool {
    true
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            port: default_port(),
            poll_interval_secs: default_poll_interval(),
            query_timeout_secs: default_query_timeout(),
            trend_window_secs: default_trend_window(),
            trend_step_secs: default_trend_step(),
            historic_offset_secs: default_historic_offset(),
            unhealthy_after_failures: default_unhealthy_after(),
            enable_average: default_enabled(),
            enable_trimmed_average: default_enabled(),
            enable_polynomial: default_enabled(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from `EXPORTER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("Failed to read exporter configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Invalid exporter configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.api_url.trim().is_empty(), "api_url must not be empty");
        ensure!(self.poll_interval_secs > 0, "poll_interval_secs must be positive");
        ensure!(self.query_timeout_secs > 0, "query_timeout_secs must be positive");
        ensure!(
            self.unhealthy_after_failures > 0,
            "unhealthy_after_failures must be positive"
        );
        self.pipeline().validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            trend_window: Duration::from_secs(self.trend_window_secs),
            trend_step: Duration::from_secs(self.trend_step_secs),
            historic_offset: Duration::from_secs(self.historic_offset_secs),
            estimators: EstimatorSelection {
                average: self.enable_average,
                trimmed_average: self.enable_trimmed_average,
                polynomial: self.enable_polynomial,
            },
        }
    }
}
