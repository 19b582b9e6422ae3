//! End-to-end DCF scenarios through the public API.
//!
//! The steady-growth company below is the reference example: revenue climbing
//! 60 → 100, margins widening, FCF conversion between 0.5 and 0.9.

use chrono::NaiveDate;
use dcflab_core::config::{ForecastMethod, TerminalDiscounting};
use dcflab_core::domain::MarketQuote;
use dcflab_core::forecast::{LinearTrendForecaster, TrendForecaster};
use dcflab_core::{
    CompanyFundamentals, DcfEngine, DiscountRate, FcfRateStatistic, FinancialTimeSeries,
    ValuationConfig, ValuationError,
};

fn latest() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
}

fn series(recent_first: &[f64]) -> FinancialTimeSeries {
    FinancialTimeSeries::from_recent_first(latest(), recent_first).unwrap()
}

fn steady_grower() -> CompanyFundamentals {
    CompanyFundamentals {
        ticker: "GROW".into(),
        free_cash_flow: series(&[18.0, 14.0, 10.0, 6.0, 2.0]),
        total_revenue: series(&[100.0, 90.0, 80.0, 70.0, 60.0]),
        net_income: series(&[20.0, 16.0, 12.0, 8.0, 4.0]),
        quote: MarketQuote {
            shares_outstanding: Some(100.0),
            current_price: Some(3.0),
            ..MarketQuote::default()
        },
        ..CompanyFundamentals::default()
    }
}

fn value(config: &ValuationConfig, company: &CompanyFundamentals) -> dcflab_core::DcfResult {
    DcfEngine::new(config)
        .compute_fair_value(company, DiscountRate::new(0.10).unwrap(), 0.025)
        .unwrap()
}

// ── Reference example ───────────────────────────────────────────────

#[test]
fn historical_margins_match_reported_ratios() {
    let res = value(&ValuationConfig::default(), &steady_grower());
    let margins = res.historical.net_income_margin.values_recent_first();
    let expected = [0.2, 0.1778, 0.15, 0.1143, 0.0667];
    assert_eq!(margins.len(), expected.len());
    for (m, e) in margins.iter().zip(expected) {
        assert!((m - e).abs() < 1e-4, "margin {m} vs {e}");
    }
}

#[test]
fn fcf_rate_is_mean_of_tight_ratios() {
    let res = value(&ValuationConfig::default(), &steady_grower());
    // 0.5, 0.75, 0.8333, 0.875, 0.9
    assert_eq!(res.fcf_rate.statistic, FcfRateStatistic::Mean);
    assert!((res.fcf_rate.rate - 0.771_666_666_666_666_7).abs() < 1e-12);
    assert!((res.fcf_rate.dispersion - 0.162_189_875_009_371_5).abs() < 1e-9);
}

#[test]
fn damped_fair_value_regression() {
    let res = value(&ValuationConfig::default(), &steady_grower());
    assert_eq!(res.forecast_method, "damped_trend");
    assert!((res.fair_value_per_share - 3.387_918_75).abs() < 1e-6, "{}", res.fair_value_per_share);
    assert!((res.terminal_value - 401.991_061_96).abs() < 1e-4);

    let revenue = res.projected.revenue.values();
    assert!((revenue[0] - 109.496_234_571).abs() < 1e-6);
    assert!((revenue[4] - 145.925_737_368).abs() < 1e-6);
}

#[test]
fn projections_follow_the_last_fiscal_year() {
    let res = value(&ValuationConfig::default(), &steady_grower());
    let periods = res.projected.free_cash_flow.periods();
    let expected: Vec<NaiveDate> = (2024..=2028)
        .map(|y| NaiveDate::from_ymd_opt(y, 12, 31).unwrap())
        .collect();
    assert_eq!(periods, expected);
}

#[test]
fn valuation_is_bit_identical_across_runs() {
    let config = ValuationConfig::default();
    let a = value(&config, &steady_grower());
    let b = value(&config, &steady_grower());
    assert_eq!(a.fair_value_per_share.to_bits(), b.fair_value_per_share.to_bits());
    assert_eq!(a, b);
}

#[test]
fn year_after_horizon_is_lower() {
    let shared = value(&ValuationConfig::default(), &steady_grower());
    let mut config = ValuationConfig::default();
    config.dcf.terminal_discounting = TerminalDiscounting::YearAfterHorizon;
    let later = value(&config, &steady_grower());
    assert!(later.fair_value_per_share < shared.fair_value_per_share);
    assert!((later.terminal_value - shared.terminal_value).abs() < 1e-12);
}

/// Year k at (1+r)^k and the terminal value at (1+r)^6.
#[test]
fn year_after_horizon_regression() {
    let mut config = ValuationConfig::default();
    config.dcf.terminal_discounting = TerminalDiscounting::YearAfterHorizon;
    let res = value(&config, &steady_grower());

    let fcf = res.projected.free_cash_flow.values();
    let by_hand: f64 = fcf
        .iter()
        .enumerate()
        .map(|(k, v)| v / 1.1f64.powi(k as i32 + 1))
        .sum::<f64>()
        + res.terminal_value / 1.1f64.powi(6);
    assert!((res.present_value - by_hand).abs() < 1e-9);
    assert!(
        (res.fair_value_per_share - 3.161_005_275_263).abs() < 1e-6,
        "{}",
        res.fair_value_per_share
    );
    assert_eq!(res.cash_flows.last().map(|cf| cf.horizon), Some(6));
}

#[test]
fn linear_and_damped_engines_agree_on_history() {
    let company = steady_grower();
    let rate = DiscountRate::new(0.10).unwrap();
    let config = ValuationConfig::default();

    let damped = DcfEngine::with_forecaster(config.dcf.clone(), Box::new(TrendForecaster::default()))
        .compute_fair_value(&company, rate, 0.025)
        .unwrap();
    let linear =
        DcfEngine::with_forecaster(config.dcf.clone(), Box::new(LinearTrendForecaster::default()))
            .compute_fair_value(&company, rate, 0.025)
            .unwrap();

    assert_eq!(damped.historical, linear.historical);
    assert_eq!(damped.fcf_rate, linear.fcf_rate);
    assert_ne!(damped.projected.revenue, linear.projected.revenue);
}

#[test]
fn linear_method_from_config_toml() {
    let config = ValuationConfig::from_toml("[forecast]\nmethod = \"linear\"\n").unwrap();
    assert_eq!(config.forecast.method, ForecastMethod::Linear);
    let res = value(&config, &steady_grower());
    assert_eq!(res.forecast_method, "linear");
    assert!(res.fair_value_per_share.is_finite());
}

// ── Failure policy ──────────────────────────────────────────────────

#[test]
fn growth_at_required_return_is_rejected() {
    let err = DcfEngine::new(&ValuationConfig::default())
        .compute_fair_value(&steady_grower(), DiscountRate::new(0.05).unwrap(), 0.05)
        .unwrap_err();
    assert!(matches!(err, ValuationError::InvalidParameters(_)));
}

#[test]
fn shrinking_business_is_worth_zero_not_negative() {
    let company = CompanyFundamentals {
        free_cash_flow: series(&[-40.0, -30.0, -20.0, -10.0, -5.0]),
        ..steady_grower()
    };
    let res = value(&ValuationConfig::default(), &company);
    assert!(res.present_value < 0.0);
    assert_eq!(res.fair_value_per_share, 0.0);
}

#[test]
fn gaps_are_dropped_before_forecasting() {
    let company = CompanyFundamentals {
        net_income: series(&[20.0, 16.0, f64::NAN, 8.0, 4.0]),
        ..steady_grower()
    };
    let res = value(&ValuationConfig::default(), &company);
    assert_eq!(
        res.dropped_periods,
        vec![NaiveDate::from_ymd_opt(2021, 12, 31).unwrap()]
    );
    assert_eq!(res.historical.free_cash_flow.len(), 4);
}

#[test]
fn misaligned_statements_leave_too_little_history() {
    let company = CompanyFundamentals {
        net_income: FinancialTimeSeries::from_recent_first(
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            &[20.0, 16.0],
        )
        .unwrap(),
        ..steady_grower()
    };
    let err = DcfEngine::new(&ValuationConfig::default())
        .compute_fair_value(&company, DiscountRate::new(0.10).unwrap(), 0.025)
        .unwrap_err();
    assert!(matches!(err, ValuationError::InvalidParameters(_)));
}
