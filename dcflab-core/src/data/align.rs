//! Multi-series period alignment.
//!
//! Given several annual series for one company, align them to a common period
//! axis. A period survives only if every series reports a finite value for it;
//! otherwise it is dropped from all of them (no forward-fill of reported data).

use std::collections::{BTreeSet, HashMap};

use crate::domain::{FinancialTimeSeries, Period};
use crate::error::ValuationError;

/// Series aligned on a common period axis.
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    /// The surviving periods (sorted ascending).
    pub periods: Vec<Period>,
    /// Periods present in at least one input but dropped for a missing value.
    pub dropped: Vec<Period>,
    /// Column values per series name, each the same length as `periods`.
    columns: HashMap<String, Vec<f64>>,
    /// Series names in input order.
    pub names: Vec<String>,
}

impl AlignedSeries {
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// The aligned column as a series.
    pub fn series(&self, name: &str) -> Result<FinancialTimeSeries, ValuationError> {
        let values = self
            .columns
            .get(name)
            .ok_or_else(|| ValuationError::missing(name))?;
        FinancialTimeSeries::new(self.periods.iter().copied().zip(values.iter().copied()))
    }
}

/// Inner-join `inputs` on period, dropping any period with a missing value.
pub fn align_series(inputs: &[(&str, &FinancialTimeSeries)]) -> AlignedSeries {
    // Collect the union of all periods
    let mut all_periods = BTreeSet::new();
    for (_, series) in inputs {
        for obs in series.iter() {
            all_periods.insert(obs.period);
        }
    }

    let mut periods = Vec::with_capacity(all_periods.len());
    let mut dropped = Vec::new();
    let mut columns: HashMap<String, Vec<f64>> = inputs
        .iter()
        .map(|(name, _)| (name.to_string(), Vec::with_capacity(all_periods.len())))
        .collect();

    for period in all_periods {
        let row: Option<Vec<f64>> = inputs
            .iter()
            .map(|(_, series)| series.get(period).filter(|v| v.is_finite()))
            .collect();

        match row {
            Some(values) => {
                periods.push(period);
                for ((name, _), v) in inputs.iter().zip(values) {
                    if let Some(col) = columns.get_mut(*name) {
                        col.push(v);
                    }
                }
            }
            None => dropped.push(period),
        }
    }

    AlignedSeries {
        periods,
        dropped,
        columns,
        names: inputs.iter().map(|(n, _)| n.to_string()).collect(),
    }
}
