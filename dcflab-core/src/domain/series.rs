//! Annual financial time series.
//!
//! A series is stored in ascending chronological order regardless of how the
//! provider reported it (statements usually arrive most recent first). Missing
//! line items are kept as NaN so alignment can drop the period across every
//! joined series at once.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;

/// Fiscal period end date.
pub type Period = NaiveDate;

/// Advance a period by whole years. Feb 29 clamps to Feb 28 in non-leap years.
pub fn years_after(period: Period, years: u32) -> Option<Period> {
    period.checked_add_months(Months::new(years.checked_mul(12)?))
}

/// Step a period back by whole years.
pub fn years_before(period: Period, years: u32) -> Option<Period> {
    period.checked_sub_months(Months::new(years.checked_mul(12)?))
}

/// One (period, value) pair. A NaN value means the line item was not reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub period: Period,
    pub value: f64,
}

impl Observation {
    pub fn new(period: Period, value: f64) -> Self {
        Self { period, value }
    }

    pub fn is_present(&self) -> bool {
        self.value.is_finite()
    }
}

/// Wire form of an observation: `null` (or an absent value) means missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawObservation {
    pub period: Period,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Ordered annual series, one entry per period, ascending by period.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<RawObservation>", into = "Vec<RawObservation>")]
pub struct FinancialTimeSeries {
    points: Vec<Observation>,
}

impl FinancialTimeSeries {
    /// Build a series from pairs in any order. Duplicate periods are rejected.
    pub fn new(points: impl IntoIterator<Item = (Period, f64)>) -> Result<Self, ValuationError> {
        let mut points: Vec<Observation> = points
            .into_iter()
            .map(|(period, value)| Observation::new(period, value))
            .collect();
        points.sort_by_key(|o| o.period);

        if let Some(w) = points.windows(2).find(|w| w[0].period == w[1].period) {
            return Err(ValuationError::DataUnavailable {
                field: "period".into(),
                reason: format!("duplicate period {}", w[0].period),
            });
        }

        Ok(Self { points })
    }

    /// Build a series from values listed most recent first, one year apart,
    /// ending at `latest`. This is how statements are usually laid out.
    pub fn from_recent_first(latest: Period, values: &[f64]) -> Result<Self, ValuationError> {
        let mut pairs = Vec::with_capacity(values.len());
        for (i, &v) in values.iter().enumerate() {
            let period = years_before(latest, i as u32).ok_or_else(|| {
                ValuationError::InvalidParameters(format!(
                    "period {latest} minus {i} years is out of range"
                ))
            })?;
            pairs.push((period, v));
        }
        Self::new(pairs)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Observations, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Observation> + ExactSizeIterator {
        self.points.iter()
    }

    /// Observations, most recent first.
    pub fn iter_recent_first(&self) -> impl Iterator<Item = &Observation> {
        self.points.iter().rev()
    }

    pub fn periods(&self) -> Vec<Period> {
        self.points.iter().map(|o| o.period).collect()
    }

    /// Values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|o| o.value).collect()
    }

    /// Values, most recent first.
    pub fn values_recent_first(&self) -> Vec<f64> {
        self.points.iter().rev().map(|o| o.value).collect()
    }

    pub fn latest(&self) -> Option<Observation> {
        self.points.last().copied()
    }

    pub fn earliest(&self) -> Option<Observation> {
        self.points.first().copied()
    }

    pub fn get(&self, period: Period) -> Option<f64> {
        self.points
            .binary_search_by_key(&period, |o| o.period)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// True when every value is finite.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(Observation::is_present)
    }

    /// Apply `f` to every value, keeping periods.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|o| Observation::new(o.period, f(o.value)))
                .collect(),
        }
    }

    /// Combine two series period by period. Both must cover the same periods.
    pub fn zip_with(
        &self,
        other: &Self,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, ValuationError> {
        if self.periods() != other.periods() {
            return Err(ValuationError::InvalidParameters(
                "series cover different periods".into(),
            ));
        }
        Ok(Self {
            points: self
                .points
                .iter()
                .zip(&other.points)
                .map(|(a, b)| Observation::new(a.period, f(a.value, b.value)))
                .collect(),
        })
    }
}

impl TryFrom<Vec<RawObservation>> for FinancialTimeSeries {
    type Error = ValuationError;

    fn try_from(raw: Vec<RawObservation>) -> Result<Self, Self::Error> {
        Self::new(
            raw.into_iter()
                .map(|r| (r.period, r.value.unwrap_or(f64::NAN))),
        )
    }
}

impl From<FinancialTimeSeries> for Vec<RawObservation> {
    fn from(series: FinancialTimeSeries) -> Self {
        series
            .points
            .into_iter()
            .map(|o| RawObservation {
                period: o.period,
                value: o.value.is_finite().then_some(o.value),
            })
            .collect()
    }
}
