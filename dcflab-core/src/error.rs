//! Valuation error taxonomy.
//!
//! Three kinds of failure reach the caller:
//! - `DataUnavailable`: upstream fundamentals are missing or malformed
//! - `InvalidParameters`: the caller asked for something mathematically undefined
//! - `ComputationError`: a division produced NaN or infinity
//!
//! The WACC estimator is the one place that never surfaces these: it falls back
//! to a fixed rate instead (see `wacc::WaccEstimator::estimate`).

use thiserror::Error;

use crate::data::DataError;

/// Errors from the valuation core.
///
/// Every variant carries enough context (field, series, step) to render a
/// user-facing message in the CLI.
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("data unavailable: {field}: {reason}")]
    DataUnavailable { field: String, reason: String },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("computation error in {step}: {detail}")]
    ComputationError { step: String, detail: String },
}

impl ValuationError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::DataUnavailable {
            field: field.into(),
            reason: "not reported".into(),
        }
    }

    pub fn computation(step: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ComputationError {
            step: step.into(),
            detail: detail.into(),
        }
    }

    /// Tag the error with the series it arose from.
    pub fn in_series(self, series: &str) -> Self {
        match self {
            Self::DataUnavailable { field, reason } => Self::DataUnavailable {
                field: format!("{series}.{field}"),
                reason,
            },
            Self::InvalidParameters(msg) => Self::InvalidParameters(format!("{series}: {msg}")),
            Self::ComputationError { step, detail } => Self::ComputationError {
                step: format!("{step} ({series})"),
                detail,
            },
        }
    }
}

impl From<DataError> for ValuationError {
    fn from(e: DataError) -> Self {
        let field = match &e {
            DataError::SymbolNotFound { symbol } => symbol.clone(),
            DataError::MissingLineItem { item, .. } => item.clone(),
            _ => "provider".to_string(),
        };
        Self::DataUnavailable {
            field,
            reason: e.to_string(),
        }
    }
}

/// Require a finite value, naming the step that produced it.
pub(crate) fn ensure_finite(value: f64, step: &str) -> Result<f64, ValuationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::computation(step, format!("non-finite result ({value})")))
    }
}
