//! Evaluation pipeline parameters
//!
//! One parameter object covers every cycle variant: the trend window, its
//! resolution, how far back the historic snapshot is taken, and which
//! estimators run.

use crate::engine::EstimatorSelection;
use crate::query::RangeWindow;
use anyhow::{ensure, Result};
use std::time::Duration;

/// Upper bound on points per series accepted by the Prometheus range API
pub const MAX_POINTS_PER_SERIES: u64 = 11_000;

/// Parameters of one evaluation cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Length of the trend window ending at the cycle time
    pub trend_window: Duration,
    /// Resolution of the trend range query
    pub trend_step: Duration,
    /// Age of the historic usage/request snapshot
    pub historic_offset: Duration,
    pub estimators: EstimatorSelection,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::daily()
    }
}

impl PipelineConfig {
    /// 24h trend at 6 minute resolution, all estimators
    pub fn daily() -> Self {
        Self {
            trend_window: Duration::from_secs(24 * 60 * 60),
            trend_step: Duration::from_secs(360),
            historic_offset: Duration::from_secs(30 * 60),
            estimators: EstimatorSelection::all(),
        }
    }

    /// 1h trend at 1 minute resolution, all estimators
    pub fn hourly() -> Self {
        Self {
            trend_window: Duration::from_secs(60 * 60),
            trend_step: Duration::from_secs(60),
            historic_offset: Duration::from_secs(30 * 60),
            estimators: EstimatorSelection::all(),
        }
    }

    pub fn with_estimators(mut self, estimators: EstimatorSelection) -> Self {
        self.estimators = estimators;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.trend_step.is_zero(), "trend step must be non-zero");
        ensure!(
            self.trend_window >= self.trend_step,
            "trend window ({:?}) is shorter than its step ({:?})",
            self.trend_window,
            self.trend_step
        );
        let points = self.trend_window.as_secs() / self.trend_step.as_secs().max(1);
        ensure!(
            points <= MAX_POINTS_PER_SERIES,
            "trend window would return {} points per series, limit is {}",
            points,
            MAX_POINTS_PER_SERIES
        );
        Ok(())
    }

    /// Trend range ending at `now` (Unix seconds)
    pub fn trend_window_ending(&self, now: f64) -> RangeWindow {
        RangeWindow::ending_at(now, self.trend_window, self.trend_step)
    }

    /// Time of the historic snapshot for a cycle running at `now`
    pub fn historic_time(&self, now: f64) -> f64 {
        now - self.historic_offset.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_presets_are_valid() {
        assert_ok!(PipelineConfig::daily().validate());
        assert_ok!(PipelineConfig::hourly().validate());
        assert_eq!(PipelineConfig::default(), PipelineConfig::daily());
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut config = PipelineConfig::daily();
        config.trend_step = Duration::ZERO;
        assert_err!(config.validate());
    }

    #[test]
    fn test_too_many_points_rejected() {
        let mut config = PipelineConfig::daily();
        config.trend_step = Duration::from_secs(1);
        assert_err!(config.validate());
    }

    #[test]
    fn test_window_times() {
        let config = PipelineConfig::daily();
        let now = 1_700_000_000.0;
        assert_eq!(config.historic_time(now), now - 1800.0);

        let window = config.trend_window_ending(now);
        assert_eq!(window.end, now);
        assert_eq!(window.start, now - 86_400.0);
        assert_eq!(window.step, Duration::from_secs(360));
    }
}
