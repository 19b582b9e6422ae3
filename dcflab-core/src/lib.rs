//! DCF Lab Core: domain types, forecasters, cost of capital, DCF engine, data providers.
//!
//! This crate contains the valuation engine:
//! - Domain types (annual series, fundamentals snapshot, discount rate)
//! - Damped-trend and least-squares forecasters behind one `Forecaster` trait
//! - WACC estimator with a fixed fallback rate
//! - DCF engine: alignment, margin and FCF-rate projection, terminal value, discounting
//! - Data providers (snapshot files, Yahoo Finance, in-memory)

pub mod config;
pub mod data;
pub mod dcf;
pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod forecast;
pub mod stats;
pub mod wacc;

pub use config::{ConfigError, ForecastMethod, TerminalDiscounting, ValuationConfig};
pub use dcf::{DcfEngine, DcfResult, FcfRateStatistic};
pub use domain::{CompanyFundamentals, DiscountRate, FinancialTimeSeries, Period};
pub use error::ValuationError;
pub use forecast::{ForecastResult, Forecaster, LinearTrendForecaster, TrendForecaster};
pub use wacc::{WaccEstimate, WaccEstimator};
