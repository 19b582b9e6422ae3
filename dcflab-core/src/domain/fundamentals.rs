//! Company fundamentals snapshot: everything one valuation needs.

use serde::{Deserialize, Serialize};

use super::series::FinancialTimeSeries;
use crate::error::ValuationError;

/// Latest-period balance sheet totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceSheet {
    pub stockholders_equity: Option<f64>,
    pub total_assets: Option<f64>,
    /// Total liabilities net of minority interest.
    pub total_liabilities: Option<f64>,
}

/// Latest-period income statement totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeStatement {
    /// Reported as a negative number by most providers.
    pub interest_expense: Option<f64>,
    pub tax_provision: Option<f64>,
    pub pretax_income: Option<f64>,
}

/// Scalar market data for the ticker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketQuote {
    pub beta: Option<f64>,
    pub current_price: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
}

/// Snapshot of reported fundamentals for one company.
///
/// Built fresh per valuation request from provider data and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyFundamentals {
    pub ticker: String,
    #[serde(default)]
    pub free_cash_flow: FinancialTimeSeries,
    #[serde(default)]
    pub total_revenue: FinancialTimeSeries,
    #[serde(default)]
    pub net_income: FinancialTimeSeries,
    #[serde(default)]
    pub quote: MarketQuote,
    #[serde(default)]
    pub balance_sheet: BalanceSheet,
    #[serde(default)]
    pub income_statement: IncomeStatement,
}

impl CompanyFundamentals {
    /// Shares outstanding, required to be a positive finite number.
    pub fn shares_outstanding(&self) -> Result<f64, ValuationError> {
        match self.quote.shares_outstanding {
            None => Err(ValuationError::missing("shares_outstanding")),
            Some(s) if !s.is_finite() || s <= 0.0 => Err(ValuationError::DataUnavailable {
                field: "shares_outstanding".into(),
                reason: format!("must be a positive number, got {s}"),
            }),
            Some(s) => Ok(s),
        }
    }
}

/// Look up a required scalar, naming it in the error when absent or non-finite.
pub fn required(value: Option<f64>, field: &str) -> Result<f64, ValuationError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(ValuationError::DataUnavailable {
            field: field.into(),
            reason: format!("non-numeric value {v}"),
        }),
        None => Err(ValuationError::missing(field)),
    }
}
