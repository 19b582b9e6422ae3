//! Weighted average cost of capital.
//!
//! ```text
//! cost_of_equity = rf + beta * (market_return - rf)
//! w_e            = stockholders_equity / total_assets
//! w_d            = total_liabilities / total_assets
//! cost_of_debt   = -interest_expense / total_liabilities
//! tax_rate       = tax_provision / pretax_income
//! wacc           = w_e * cost_of_equity + w_d * cost_of_debt * (1 - tax_rate)
//! ```
//!
//! `estimate` never fails: any missing input or bad division yields the
//! configured fallback rate so the valuation can always proceed.
//! `try_estimate` exposes the same computation with its error.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::WaccConfig;
use crate::domain::{required, CompanyFundamentals};
use crate::error::{ensure_finite, ValuationError};
use crate::stats::round_to;

/// Every intermediate of a successful estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaccBreakdown {
    pub risk_free_rate: f64,
    pub beta: f64,
    pub cost_of_equity: f64,
    pub weight_of_equity: f64,
    pub weight_of_debt: f64,
    pub cost_of_debt: f64,
    pub tax_rate: f64,
    pub wacc: f64,
}

/// Outcome of `WaccEstimator::estimate_detailed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaccEstimate {
    pub wacc: f64,
    /// Present when the estimate was computed rather than defaulted.
    pub breakdown: Option<WaccBreakdown>,
    /// Why the fallback was used, if it was.
    pub fallback_reason: Option<String>,
}

impl WaccEstimate {
    pub fn used_fallback(&self) -> bool {
        self.breakdown.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaccEstimator {
    config: WaccConfig,
}

impl WaccEstimator {
    pub fn new(config: WaccConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WaccConfig {
        &self.config
    }

    /// WACC for `company`, or the fallback rate when anything is missing.
    pub fn estimate(&self, company: &CompanyFundamentals, risk_free_rate: f64) -> f64 {
        self.estimate_detailed(company, risk_free_rate).wacc
    }

    /// Like `estimate`, but keeps the breakdown or the fallback reason.
    pub fn estimate_detailed(
        &self,
        company: &CompanyFundamentals,
        risk_free_rate: f64,
    ) -> WaccEstimate {
        match self.try_estimate(company, risk_free_rate) {
            Ok(breakdown) => {
                debug!(ticker = %company.ticker, wacc = breakdown.wacc, "estimated WACC");
                WaccEstimate {
                    wacc: breakdown.wacc,
                    breakdown: Some(breakdown),
                    fallback_reason: None,
                }
            }
            Err(e) => {
                warn!(
                    ticker = %company.ticker,
                    error = %e,
                    fallback = self.config.fallback_rate,
                    "WACC estimation failed, using fallback rate"
                );
                WaccEstimate {
                    wacc: self.config.fallback_rate,
                    breakdown: None,
                    fallback_reason: Some(e.to_string()),
                }
            }
        }
    }

    /// The full computation, propagating the first failure.
    pub fn try_estimate(
        &self,
        company: &CompanyFundamentals,
        risk_free_rate: f64,
    ) -> Result<WaccBreakdown, ValuationError> {
        let bs = &company.balance_sheet;
        let is = &company.income_statement;

        let rf = self.round(required(Some(risk_free_rate), "risk_free_rate")?);
        let beta = required(company.quote.beta, "beta")?;
        let equity = required(bs.stockholders_equity, "stockholders_equity")?;
        let assets = required(bs.total_assets, "total_assets")?;
        let liabilities = required(bs.total_liabilities, "total_liabilities")?;
        let interest = required(is.interest_expense, "interest_expense")?;
        let tax = required(is.tax_provision, "tax_provision")?;
        let pretax = required(is.pretax_income, "pretax_income")?;

        let cost_of_equity = self.round(rf + beta * (self.config.market_return - rf));
        // Unrounded, as calibrated.
        let weight_of_equity = ensure_finite(equity / assets, "weight of equity")?;
        let cost_of_debt = self.round(ensure_finite(-interest / liabilities, "cost of debt")?);
        let weight_of_debt = self.round(ensure_finite(liabilities / assets, "weight of debt")?);
        let tax_rate = self.round(ensure_finite(tax / pretax, "tax rate")?);

        let wacc = self.round(ensure_finite(
            weight_of_equity * cost_of_equity + weight_of_debt * cost_of_debt * (1.0 - tax_rate),
            "wacc",
        )?);

        Ok(WaccBreakdown {
            risk_free_rate: rf,
            beta,
            cost_of_equity,
            weight_of_equity,
            weight_of_debt,
            cost_of_debt,
            tax_rate,
            wacc,
        })
    }

    /// Default required return: the WACC when it is plausible, else the fallback.
    pub fn suggested_required_return(&self, wacc: f64) -> f64 {
        if wacc.is_finite() && wacc >= self.config.plausible_min && wacc <= self.config.plausible_max
        {
            wacc
        } else {
            self.config.fallback_rate
        }
    }

    fn round(&self, v: f64) -> f64 {
        if self.config.round_intermediates {
            round_to(v, 2)
        } else {
            v
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BalanceSheet, IncomeStatement, MarketQuote};
    use crate::stats::assert_approx;

    fn company() -> CompanyFundamentals {
        CompanyFundamentals {
            ticker: "ACME".into(),
            quote: MarketQuote {
                beta: Some(1.2),
                shares_outstanding: Some(1_000.0),
                ..MarketQuote::default()
            },
            balance_sheet: BalanceSheet {
                stockholders_equity: Some(400.0),
                total_assets: Some(1_000.0),
                total_liabilities: Some(600.0),
            },
            income_statement: IncomeStatement {
                interest_expense: Some(-30.0),
                tax_provision: Some(21.0),
                pretax_income: Some(100.0),
            },
            ..CompanyFundamentals::default()
        }
    }

    #[test]
    fn rounded_breakdown_matches_hand_computation() {
        // rf 0.04 → ke = 0.04 + 1.2 * 0.06 = 0.112 → 0.11
        // we = 0.4, wd = 0.6, kd = 30/600 = 0.05, t = 0.21
        // wacc = 0.4*0.11 + 0.6*0.05*0.79 = 0.044 + 0.0237 = 0.0677 → 0.07
        let b = WaccEstimator::default().try_estimate(&company(), 0.04).unwrap();
        assert_approx(b.cost_of_equity, 0.11, 1e-12);
        assert_approx(b.weight_of_equity, 0.4, 1e-12);
        assert_approx(b.weight_of_debt, 0.6, 1e-12);
        assert_approx(b.cost_of_debt, 0.05, 1e-12);
        assert_approx(b.tax_rate, 0.21, 1e-12);
        assert_approx(b.wacc, 0.07, 1e-12);
    }

    #[test]
    fn tax_rate_rounds_the_stored_value() {
        // 7.5 / 100 is stored just below 0.075
        let mut c = company();
        c.income_statement.tax_provision = Some(7.5);
        let b = WaccEstimator::default().try_estimate(&c, 0.04).unwrap();
        assert_eq!(b.tax_rate, 0.07);
        // 0.4*0.11 + 0.6*0.05*0.93 = 0.044 + 0.0279 = 0.0719 → 0.07
        assert_approx(b.wacc, 0.07, 1e-12);
    }

    #[test]
    fn unrounded_keeps_precision() {
        let config = WaccConfig {
            round_intermediates: false,
            ..WaccConfig::default()
        };
        let wacc = WaccEstimator::new(config).estimate(&company(), 0.04);
        // 0.4*0.112 + 0.6*0.05*0.79
        assert_approx(wacc, 0.0448 + 0.0237, 1e-12);
    }

    #[test]
    fn risk_free_rate_is_rounded_first() {
        let a = WaccEstimator::default().try_estimate(&company(), 0.0412).unwrap();
        assert_approx(a.risk_free_rate, 0.04, 1e-12);
    }

    #[test]
    fn missing_field_falls_back() {
        let mut c = company();
        c.quote.beta = None;
        assert_eq!(WaccEstimator::default().estimate(&c, 0.04), 0.075);

        let mut c = company();
        c.balance_sheet.total_liabilities = None;
        let est = WaccEstimator::default().estimate_detailed(&c, 0.04);
        assert!(est.used_fallback());
        assert_eq!(est.wacc, 0.075);
        assert!(est.fallback_reason.unwrap().contains("total_liabilities"));
    }

    #[test]
    fn zero_denominator_falls_back() {
        let mut c = company();
        c.income_statement.pretax_income = Some(0.0);
        assert_eq!(WaccEstimator::default().estimate(&c, 0.04), 0.075);

        let mut c = company();
        c.balance_sheet.total_assets = Some(0.0);
        assert_eq!(WaccEstimator::default().estimate(&c, 0.04), 0.075);
    }

    #[test]
    fn non_finite_risk_free_falls_back() {
        assert_eq!(WaccEstimator::default().estimate(&company(), f64::NAN), 0.075);
    }

    #[test]
    fn suggestion_respects_plausible_band() {
        let est = WaccEstimator::default();
        assert_eq!(est.suggested_required_return(0.09), 0.09);
        assert_eq!(est.suggested_required_return(0.05), 0.05);
        assert_eq!(est.suggested_required_return(0.12), 0.12);
        assert_eq!(est.suggested_required_return(0.03), 0.075);
        assert_eq!(est.suggested_required_return(0.2), 0.075);
        assert_eq!(est.suggested_required_return(f64::NAN), 0.075);
    }
}
