//! Discount rate newtype.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValuationError;

/// Required rate of return used to discount projected cash flows.
///
/// Always finite and strictly inside (0, 1). Either the estimated WACC or a
/// caller override.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DiscountRate(f64);

impl DiscountRate {
    pub fn new(rate: f64) -> Result<Self, ValuationError> {
        if rate.is_finite() && rate > 0.0 && rate < 1.0 {
            Ok(Self(rate))
        } else {
            Err(ValuationError::InvalidParameters(format!(
                "discount rate must be in (0, 1), got {rate}"
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for DiscountRate {
    type Error = ValuationError;

    fn try_from(rate: f64) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<DiscountRate> for f64 {
    fn from(rate: DiscountRate) -> Self {
        rate.0
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0 * 100.0)
    }
}
