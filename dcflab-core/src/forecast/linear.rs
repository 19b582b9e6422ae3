//! Least-squares linear trend.
//!
//! Observations are indexed chronologically: x = 0 for the oldest, x = n - 1
//! for the most recent. Slope and intercept come from the closed-form sums
//! Σxy, Σx², Σx, Σy. The forecast for the k-th year ahead is evaluated at
//! x = n - 1 + k, so the projection picks up exactly where the history ends.

use super::{checked_history, ForecastResult, Forecaster};
use crate::config::FORECAST_HORIZON;
use crate::domain::FinancialTimeSeries;
use crate::error::{ensure_finite, ValuationError};

/// Fitted line over the chronological index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Number of observations the line was fitted on.
    pub n: usize,
}

impl LinearFit {
    /// Ordinary least squares over x = 0..n-1. Needs at least two values.
    pub fn fit(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let sigma_xy: f64 = values.iter().enumerate().map(|(x, y)| x as f64 * y).sum();
        let sigma_x2 = (nf - 1.0) * nf * (2.0 * nf - 1.0) / 6.0;
        let sigma_x = (nf - 1.0) * nf / 2.0;
        let sigma_y: f64 = values.iter().sum();

        let slope = (nf * sigma_xy - sigma_x * sigma_y) / (nf * sigma_x2 - sigma_x.powi(2));
        let intercept = (sigma_y - slope * sigma_x) / nf;
        Some(Self {
            slope,
            intercept,
            n,
        })
    }

    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    /// Value `steps` years after the last fitted observation.
    pub fn ahead(&self, steps: usize) -> f64 {
        self.at((self.n - 1 + steps) as f64)
    }
}

/// Projects a series along its least-squares line.
#[derive(Debug, Clone)]
pub struct LinearTrendForecaster {
    horizon: usize,
}

impl LinearTrendForecaster {
    pub fn new(horizon: usize) -> Self {
        Self { horizon }
    }
}

impl Default for LinearTrendForecaster {
    fn default() -> Self {
        Self::new(FORECAST_HORIZON)
    }
}

impl Forecaster for LinearTrendForecaster {
    fn name(&self) -> &str {
        "linear"
    }

    fn forecast(&self, history: &FinancialTimeSeries) -> Result<ForecastResult, ValuationError> {
        let (values, latest) = checked_history(history)?;
        let fit = LinearFit::fit(&values).ok_or_else(|| {
            ValuationError::InvalidParameters("linear fit needs at least 2 points".into())
        })?;

        let projected = (1..=self.horizon)
            .map(|k| ensure_finite(fit.ahead(k), "linear forecast"))
            .collect::<Result<Vec<_>, _>>()?;

        ForecastResult::following(latest, &projected)
    }
}
