//! Usage estimators over a trend window
//!
//! Three independent estimators summarise a pod's recent usage:
//! - plain average of the defined samples
//! - trimmed average that drops the lowest and highest 5%
//! - degree-2 least-squares polynomial evaluated one step past the window
//!
//! Indeterminate results (no defined samples, empty trimmed window) surface
//! as `f64::NAN`. The polynomial fit reports under-determined input through
//! [`EstimateError`] instead of extrapolating from too few points.

use crate::models::Sample;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fraction of sorted values trimmed from each end by [`trimmed_average`]
pub const TRIM_FRACTION: f64 = 0.05;

/// Degree of the fitted forecast polynomial
pub const POLYNOMIAL_DEGREE: usize = 2;

/// Minimum number of points for a determined degree-2 fit
pub const MIN_FIT_POINTS: usize = POLYNOMIAL_DEGREE + 1;

const COEFFICIENTS: usize = POLYNOMIAL_DEGREE + 1;

/// Errors from the polynomial fit
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("polynomial fit needs at least {MIN_FIT_POINTS} points, got {0}")]
    InsufficientPoints(usize),

    #[error("normal equations are singular")]
    Singular,
}

/// Which estimators run on the trend series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorSelection {
    pub average: bool,
    pub trimmed_average: bool,
    pub polynomial: bool,
}

impl EstimatorSelection {
    pub fn all() -> Self {
        Self {
            average: true,
            trimmed_average: true,
            polynomial: true,
        }
    }

    pub fn none() -> Self {
        Self {
            average: false,
            trimmed_average: false,
            polynomial: false,
        }
    }

    /// True if at least one estimator needs the trend series
    pub fn any(&self) -> bool {
        self.average || self.trimmed_average || self.polynomial
    }
}

impl Default for EstimatorSelection {
    fn default() -> Self {
        Self::all()
    }
}

/// Mean of the defined sample values.
///
/// Divides by the number of defined samples, not the window length. Returns
/// `NaN` when no sample is defined.
pub fn average(samples: &[Sample]) -> f64 {
    let (sum, count) = samples
        .iter()
        .filter_map(|s| s.value)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    sum / count as f64
}

/// Mean of the defined values after trimming the outer 5% on each side.
///
/// The kept slice is `sorted[floor(n * 0.05) .. floor(n * 0.95)]`. Small
/// inputs can leave an empty slice, which yields `NaN`.
pub fn trimmed_average(samples: &[Sample]) -> f64 {
    let mut values: Vec<f64> = samples.iter().filter_map(|s| s.value).collect();
    values.sort_by(f64::total_cmp);

    let n = values.len() as f64;
    let start = (n * TRIM_FRACTION).floor() as usize;
    let end = (n * (1.0 - TRIM_FRACTION)).floor() as usize;
    let kept = values.get(start..end).unwrap_or(&[]);

    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Result of a degree-2 least-squares fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolynomialForecast {
    /// Coefficients in ascending power order: `c0 + c1*x + c2*x^2`
    pub coefficients: [f64; COEFFICIENTS],
    /// Position the forecast was evaluated at
    pub at: f64,
    /// Fitted polynomial evaluated at `at`
    pub value: f64,
}

impl PolynomialForecast {
    pub fn evaluate(&self, x: f64) -> f64 {
        // Horner's scheme
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * x + c)
    }

    /// Human-readable form of the fitted curve
    pub fn equation(&self) -> String {
        self.coefficients
            .iter()
            .enumerate()
            .map(|(power, c)| format!("{:.6} * x^{}", c, power))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

/// Fit `y = c0 + c1*x + c2*x^2` to `points` and evaluate it at `at`.
pub fn polynomial_forecast(points: &[(f64, f64)], at: f64) -> Result<PolynomialForecast, EstimateError> {
    if points.len() < MIN_FIT_POINTS {
        return Err(EstimateError::InsufficientPoints(points.len()));
    }

    // Normal equations: A[i][j] = sum x^(i+j), b[i] = sum y * x^i
    let mut power_sums = [0.0; 2 * POLYNOMIAL_DEGREE + 1];
    let mut rhs = [0.0; COEFFICIENTS];
    for &(x, y) in points {
        let mut xp = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += xp;
            if k < COEFFICIENTS {
                rhs[k] += y * xp;
            }
            xp *= x;
        }
    }

    let mut matrix = [[0.0; COEFFICIENTS]; COEFFICIENTS];
    for (i, row) in matrix.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = power_sums[i + j];
        }
    }

    let coefficients = solve(matrix, rhs)?;
    let mut forecast = PolynomialForecast {
        coefficients,
        at,
        value: f64::NAN,
    };
    forecast.value = forecast.evaluate(at);
    Ok(forecast)
}

/// Gaussian elimination with partial pivoting
fn solve(
    mut a: [[f64; COEFFICIENTS]; COEFFICIENTS],
    mut b: [f64; COEFFICIENTS],
) -> Result<[f64; COEFFICIENTS], EstimateError> {
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |m, v| m.max(v.abs()));
    let tolerance = scale * f64::EPSILON * COEFFICIENTS as f64;

    for col in 0..COEFFICIENTS {
        let pivot = (col..COEFFICIENTS)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);

        if a[pivot][col].abs() <= tolerance {
            return Err(EstimateError::Singular);
        }

        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..COEFFICIENTS {
            let factor = a[row][col] / a[col][col];
            for k in col..COEFFICIENTS {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0; COEFFICIENTS];
    for row in (0..COEFFICIENTS).rev() {
        let tail: f64 = (row + 1..COEFFICIENTS).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Ok(x)
}
