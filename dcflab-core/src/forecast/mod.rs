//! Trend forecasters: project an annual series a fixed number of years ahead.
//!
//! Two implementations share the `Forecaster` trait:
//! - `TrendForecaster`: Holt's damped-trend exponential smoothing (default)
//! - `LinearTrendForecaster`: closed-form ordinary least squares
//!
//! Both return a `ForecastResult` whose periods continue the history one year
//! at a time, starting the year after the latest observation.

pub mod damped;
pub mod linear;

pub use damped::{DampedTrendFit, TrendForecaster};
pub use linear::{LinearFit, LinearTrendForecaster};

use serde::{Deserialize, Serialize};

use crate::config::{ForecastConfig, ForecastMethod};
use crate::domain::{years_after, FinancialTimeSeries, Observation, Period};
use crate::error::ValuationError;

/// Projected values for consecutive future years, stored oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    series: FinancialTimeSeries,
}

impl ForecastResult {
    /// Attach `values` (nearest year first) to the years following `last_period`.
    pub fn following(last_period: Period, values: &[f64]) -> Result<Self, ValuationError> {
        let periods = future_periods(last_period, values.len())?;
        let series = FinancialTimeSeries::new(periods.into_iter().zip(values.iter().copied()))?;
        Ok(Self { series })
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Projected values, nearest year first.
    pub fn values(&self) -> Vec<f64> {
        self.series.values()
    }

    /// Projected values, furthest year first.
    pub fn values_recent_first(&self) -> Vec<f64> {
        self.series.values_recent_first()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.series.periods()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Observation> + ExactSizeIterator {
        self.series.iter()
    }

    pub fn nearest(&self) -> Option<Observation> {
        self.series.earliest()
    }

    pub fn furthest(&self) -> Option<Observation> {
        self.series.latest()
    }

    pub fn as_series(&self) -> &FinancialTimeSeries {
        &self.series
    }

    /// Elementwise combination of two forecasts over the same years.
    pub fn zip_with(
        &self,
        other: &Self,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, ValuationError> {
        Ok(Self {
            series: self.series.zip_with(&other.series, f)?,
        })
    }

    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            series: self.series.map_values(f),
        }
    }
}

/// Forecasts a historical annual series a fixed number of years ahead.
pub trait Forecaster: Send + Sync {
    /// Human-readable name of the method.
    fn name(&self) -> &str;

    /// Project `history` forward. Needs at least two finite observations.
    fn forecast(&self, history: &FinancialTimeSeries) -> Result<ForecastResult, ValuationError>;
}

/// Build the forecaster selected by the configuration.
pub fn forecaster_for(config: &ForecastConfig) -> Box<dyn Forecaster> {
    match config.method {
        ForecastMethod::DampedTrend => Box::new(TrendForecaster::from_config(config)),
        ForecastMethod::Linear => Box::new(LinearTrendForecaster::new(config.horizon)),
    }
}

/// The `count` years after `last`, nearest first.
pub fn future_periods(last: Period, count: usize) -> Result<Vec<Period>, ValuationError> {
    (1..=count as u32)
        .map(|k| {
            years_after(last, k).ok_or_else(|| {
                ValuationError::InvalidParameters(format!("period {last} plus {k} years overflows"))
            })
        })
        .collect()
}

/// Check a history is usable: at least two points, all finite.
/// Returns the values oldest first and the latest period.
pub(crate) fn checked_history(
    history: &FinancialTimeSeries,
) -> Result<(Vec<f64>, Period), ValuationError> {
    let latest = match history.latest() {
        Some(o) if history.len() >= 2 => o.period,
        _ => {
            return Err(ValuationError::InvalidParameters(format!(
                "forecasting needs at least 2 historical points, got {}",
                history.len()
            )))
        }
    };
    if let Some(bad) = history.iter().find(|o| !o.is_present()) {
        return Err(ValuationError::computation(
            "forecast input",
            format!("non-finite value at {}", bad.period),
        ));
    }
    Ok((history.values(), latest))
}
