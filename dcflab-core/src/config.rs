//! Valuation configuration.
//!
//! Every tunable constant of the model lives here under a name, with defaults
//! equal to the values the model was calibrated with. A TOML file only needs
//! to list the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of annual periods every forecast projects.
pub const FORECAST_HORIZON: usize = 5;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// WACC estimator constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaccConfig {
    /// Long-run equity market return used in CAPM.
    pub market_return: f64,
    /// Returned whenever estimation fails.
    pub fallback_rate: f64,
    /// Round intermediates and the result to 2 decimal places.
    pub round_intermediates: bool,
    /// A WACC outside [plausible_min, plausible_max] is not suggested as the
    /// default required return.
    pub plausible_min: f64,
    pub plausible_max: f64,
}

impl Default for WaccConfig {
    fn default() -> Self {
        Self {
            market_return: 0.10,
            fallback_rate: 0.075,
            round_intermediates: true,
            plausible_min: 0.05,
            plausible_max: 0.12,
        }
    }
}

/// Which forecaster projects revenue and margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    #[default]
    DampedTrend,
    Linear,
}

impl std::str::FromStr for ForecastMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "damped" | "damped_trend" => Ok(Self::DampedTrend),
            "linear" => Ok(Self::Linear),
            _ => Err(format!("unknown forecast method '{s}'. Valid: damped, linear")),
        }
    }
}

/// Forecaster constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub method: ForecastMethod,
    pub horizon: usize,
    /// Level smoothing (alpha).
    pub smoothing_level: f64,
    /// Trend smoothing (beta).
    pub smoothing_trend: f64,
    /// Search bounds for the estimated damping factor (phi).
    pub damping_min: f64,
    pub damping_max: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            method: ForecastMethod::DampedTrend,
            horizon: FORECAST_HORIZON,
            smoothing_level: 0.8,
            smoothing_trend: 0.4,
            damping_min: 0.8,
            damping_max: 0.98,
        }
    }
}

/// How far the terminal value is discounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TerminalDiscounting {
    /// Same exponent as the furthest projected cash flow.
    #[default]
    SharedFinalHorizon,
    /// One year past the furthest projected cash flow.
    YearAfterHorizon,
}

/// DCF engine constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DcfConfig {
    /// Added to revenue before computing margins.
    pub margin_epsilon: f64,
    /// Above this sample std dev of FCF / net income the median is used.
    pub fcf_dispersion_threshold: f64,
    pub terminal_discounting: TerminalDiscounting,
    /// Smallest accepted `required_return - perpetual_growth`.
    pub min_rate_spread: f64,
    pub default_perpetual_growth: f64,
}

impl Default for DcfConfig {
    fn default() -> Self {
        Self {
            margin_epsilon: 1e-10,
            fcf_dispersion_threshold: 1.0,
            terminal_discounting: TerminalDiscounting::SharedFinalHorizon,
            min_rate_spread: 1e-9,
            default_perpetual_growth: 0.025,
        }
    }
}

/// Complete valuation configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationConfig {
    pub wacc: WaccConfig,
    pub forecast: ForecastConfig,
    pub dcf: DcfConfig,
}

impl ValuationConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.forecast;
        open_unit("forecast.smoothing_level", f.smoothing_level)?;
        open_unit("forecast.smoothing_trend", f.smoothing_trend)?;
        if f.horizon != FORECAST_HORIZON {
            return Err(ConfigError::Invalid {
                field: "forecast.horizon",
                reason: format!("the model projects exactly {FORECAST_HORIZON} periods"),
            });
        }
        if !(f.damping_min > 0.0 && f.damping_min <= f.damping_max && f.damping_max <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "forecast.damping_min",
                reason: format!(
                    "need 0 < damping_min <= damping_max <= 1, got [{}, {}]",
                    f.damping_min, f.damping_max
                ),
            });
        }

        let w = &self.wacc;
        open_unit("wacc.market_return", w.market_return)?;
        open_unit("wacc.fallback_rate", w.fallback_rate)?;
        if w.plausible_min > w.plausible_max {
            return Err(ConfigError::Invalid {
                field: "wacc.plausible_min",
                reason: "must not exceed plausible_max".into(),
            });
        }

        let d = &self.dcf;
        positive("dcf.margin_epsilon", d.margin_epsilon)?;
        positive("dcf.min_rate_spread", d.min_rate_spread)?;
        if !(d.fcf_dispersion_threshold.is_finite() && d.fcf_dispersion_threshold >= 0.0) {
            return Err(ConfigError::Invalid {
                field: "dcf.fcf_dispersion_threshold",
                reason: "must be a non-negative number".into(),
            });
        }
        if !d.default_perpetual_growth.is_finite() {
            return Err(ConfigError::Invalid {
                field: "dcf.default_perpetual_growth",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }
}

fn open_unit(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 && v < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be in (0, 1), got {v}"),
        })
    }
}

fn positive(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive, got {v}"),
        })
    }
}
