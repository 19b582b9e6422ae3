//! Valuation pipeline: wires provider, WACC estimator and DCF engine.
//!
//! One request runs:
//! 1. Range checks on the caller's growth and required-return overrides
//! 2. Fundamentals and risk-free rate from the provider
//! 3. WACC (never fails, falls back to a fixed rate)
//! 4. Required return: the override, else the WACC when plausible, else the fallback
//! 5. DCF fair value, then the report

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use dcflab_core::config::ConfigError;
use dcflab_core::data::{DataError, DataProvider};
use dcflab_core::{DcfEngine, DiscountRate, ValuationConfig, ValuationError, WaccEstimator};

use crate::report::ValuationReport;

/// Accepted perpetual growth rates.
pub const GROWTH_RANGE: RangeInclusive<f64> = 0.005..=0.050;

/// Accepted required returns.
pub const REQUIRED_RETURN_RANGE: RangeInclusive<f64> = 0.01..=0.20;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("valuation error: {0}")]
    Valuation(#[from] ValuationError),
    #[error("provider '{0}' is unavailable")]
    ProviderUnavailable(String),
}

/// What to value and with which overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub ticker: String,
    /// Defaults to `dcf.default_perpetual_growth`.
    pub perpetual_growth_rate: Option<f64>,
    /// Overrides the WACC-based default.
    pub required_return: Option<f64>,
    /// Overrides the provider's treasury yield.
    pub risk_free_rate: Option<f64>,
}

impl ValuationRequest {
    pub fn new(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into().to_ascii_uppercase(),
            perpetual_growth_rate: None,
            required_return: None,
            risk_free_rate: None,
        }
    }

    pub fn with_growth(mut self, g: f64) -> Self {
        self.perpetual_growth_rate = Some(g);
        self
    }

    pub fn with_required_return(mut self, r: f64) -> Self {
        self.required_return = Some(r);
        self
    }

    pub fn with_risk_free_rate(mut self, rf: f64) -> Self {
        self.risk_free_rate = Some(rf);
        self
    }

    /// Reject overrides outside the accepted ranges.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if let Some(g) = self.perpetual_growth_rate {
            check_range("perpetual growth rate", g, &GROWTH_RANGE)?;
        }
        if let Some(r) = self.required_return {
            check_range("required return", r, &REQUIRED_RETURN_RANGE)?;
        }
        Ok(())
    }
}

fn check_range(name: &str, v: f64, range: &RangeInclusive<f64>) -> Result<(), ValuationError> {
    if range.contains(&v) {
        Ok(())
    } else {
        Err(ValuationError::InvalidParameters(format!(
            "{name} must be in [{:.3}, {:.3}], got {v}",
            range.start(),
            range.end()
        )))
    }
}

/// Where the required return came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Supplied by the caller.
    Override,
    /// The estimated WACC, inside the plausible band.
    Wacc,
    /// The configured fallback rate.
    Fallback,
}

/// Value one ticker end to end.
pub fn value_ticker(
    provider: &dyn DataProvider,
    config: &ValuationConfig,
    request: &ValuationRequest,
) -> Result<ValuationReport, RunError> {
    request.validate()?;
    if !provider.is_available() {
        return Err(RunError::ProviderUnavailable(provider.name().to_string()));
    }

    let company = provider.fundamentals(&request.ticker)?;
    debug!(ticker = %request.ticker, provider = provider.name(), "loaded fundamentals");

    // A missing treasury yield only costs the WACC, which then falls back.
    let risk_free_rate = match request.risk_free_rate {
        Some(rf) => Some(rf),
        None => match provider.risk_free_rate() {
            Ok(rf) => Some(rf),
            Err(e) => {
                warn!(error = %e, "risk-free rate unavailable");
                None
            }
        },
    };

    let estimator = WaccEstimator::new(config.wacc.clone());
    let wacc = estimator.estimate_detailed(&company, risk_free_rate.unwrap_or(f64::NAN));

    let (required_return, source) = match request.required_return {
        Some(r) => (r, RateSource::Override),
        None => {
            let suggested = estimator.suggested_required_return(wacc.wacc);
            if !wacc.used_fallback() && suggested == wacc.wacc {
                (suggested, RateSource::Wacc)
            } else {
                (suggested, RateSource::Fallback)
            }
        }
    };
    let growth = request
        .perpetual_growth_rate
        .unwrap_or(config.dcf.default_perpetual_growth);

    let dcf = DcfEngine::new(config).compute_fair_value(
        &company,
        DiscountRate::new(required_return)?,
        growth,
    )?;

    info!(
        ticker = %company.ticker,
        fair_value = dcf.fair_value_per_share,
        required_return,
        growth,
        "valuation complete"
    );

    Ok(ValuationReport::new(
        &company,
        config,
        risk_free_rate,
        wacc,
        source,
        dcf,
    ))
}
