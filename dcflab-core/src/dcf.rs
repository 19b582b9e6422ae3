//! Discounted cash flow engine.
//!
//! Pipeline for one valuation:
//! 1. Align free cash flow, revenue and net income, dropping incomplete periods
//! 2. Net income margin = net income / (revenue + ε)
//! 3. Forecast revenue and margin; projected net income = revenue × margin
//! 4. FCF rate = mean (or median, if dispersed) of historical FCF / net income
//! 5. Projected FCF = projected net income × FCF rate
//! 6. Terminal value from the furthest projected FCF under perpetual growth
//! 7. Discount everything and divide by shares outstanding, floored at zero
//!
//! Unlike the WACC estimator, every failure here reaches the caller.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{DcfConfig, TerminalDiscounting, ValuationConfig};
use crate::data::align::align_series;
use crate::domain::{CompanyFundamentals, DiscountRate, FinancialTimeSeries, Period};
use crate::error::{ensure_finite, ValuationError};
use crate::forecast::{forecaster_for, ForecastResult, Forecaster};
use crate::stats::{mean, median, sample_std_dev};

const FCF: &str = "free_cash_flow";
const REVENUE: &str = "total_revenue";
const NET_INCOME: &str = "net_income";

/// Which central tendency produced the FCF rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FcfRateStatistic {
    Mean,
    Median,
}

/// Historical FCF conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FcfRate {
    pub rate: f64,
    pub statistic: FcfRateStatistic,
    /// Sample standard deviation of the per-period ratios.
    pub dispersion: f64,
    /// FCF / net income per aligned period.
    pub ratios: FinancialTimeSeries,
}

/// One discounted cash-flow event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountedCashFlow {
    pub period: Period,
    pub cash_flow: f64,
    /// Years of discounting applied.
    pub horizon: u32,
    pub discount_factor: f64,
    pub present_value: f64,
    pub is_terminal: bool,
}

/// Aligned historical inputs, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub free_cash_flow: FinancialTimeSeries,
    pub revenue: FinancialTimeSeries,
    pub net_income: FinancialTimeSeries,
    pub net_income_margin: FinancialTimeSeries,
}

/// Projections over the forecast horizon, nearest year first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedSeries {
    pub free_cash_flow: ForecastResult,
    pub revenue: ForecastResult,
    pub net_income: ForecastResult,
    pub net_income_margin: ForecastResult,
}

/// Outcome of a DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfResult {
    /// Present value per share, never negative.
    pub fair_value_per_share: f64,
    /// Sum of discounted cash flows including the terminal value.
    pub present_value: f64,
    pub shares_outstanding: f64,
    pub terminal_value: f64,
    pub required_return: f64,
    pub perpetual_growth_rate: f64,
    pub fcf_rate: FcfRate,
    pub cash_flows: Vec<DiscountedCashFlow>,
    pub historical: HistoricalSeries,
    pub projected: ProjectedSeries,
    /// Reported periods left out because a line item was missing.
    pub dropped_periods: Vec<Period>,
    pub forecast_method: String,
}

/// DCF engine parameterized by its constants and forecasting method.
pub struct DcfEngine {
    config: DcfConfig,
    forecaster: Box<dyn Forecaster>,
}

impl DcfEngine {
    pub fn new(config: &ValuationConfig) -> Self {
        Self {
            config: config.dcf.clone(),
            forecaster: forecaster_for(&config.forecast),
        }
    }

    pub fn with_forecaster(config: DcfConfig, forecaster: Box<dyn Forecaster>) -> Self {
        Self { config, forecaster }
    }

    pub fn config(&self) -> &DcfConfig {
        &self.config
    }

    /// Value `company` at `required_return` with perpetual growth `perpetual_growth_rate`.
    pub fn compute_fair_value(
        &self,
        company: &CompanyFundamentals,
        required_return: DiscountRate,
        perpetual_growth_rate: f64,
    ) -> Result<DcfResult, ValuationError> {
        let r = required_return.value();
        let g = perpetual_growth_rate;
        self.check_rates(r, g)?;

        let shares = company.shares_outstanding()?;
        for (name, series) in [
            (FCF, &company.free_cash_flow),
            (REVENUE, &company.total_revenue),
            (NET_INCOME, &company.net_income),
        ] {
            if series.is_empty() {
                return Err(ValuationError::missing(name));
            }
        }

        // 1. Align
        let aligned = align_series(&[
            (FCF, &company.free_cash_flow),
            (REVENUE, &company.total_revenue),
            (NET_INCOME, &company.net_income),
        ]);
        if aligned.len() < 2 {
            return Err(ValuationError::InvalidParameters(format!(
                "need at least 2 periods with free cash flow, revenue and net income all reported, got {}",
                aligned.len()
            )));
        }
        let fcf = aligned.series(FCF)?;
        let revenue = aligned.series(REVENUE)?;
        let net_income = aligned.series(NET_INCOME)?;
        debug!(
            ticker = %company.ticker,
            periods = aligned.len(),
            dropped = aligned.dropped.len(),
            "aligned historical series"
        );

        // 2. Margin
        let eps = self.config.margin_epsilon;
        let margin = net_income.zip_with(&revenue, |ni, rev| ni / (rev + eps))?;
        check_series(&margin, "net income margin")?;

        // 3. Forecast revenue and margin
        let projected_revenue = self
            .forecaster
            .forecast(&revenue)
            .map_err(|e| e.in_series(REVENUE))?;
        let projected_margin = self
            .forecaster
            .forecast(&margin)
            .map_err(|e| e.in_series("net_income_margin"))?;
        let projected_net_income = projected_revenue.zip_with(&projected_margin, |rv, m| rv * m)?;

        // 4. FCF rate
        let fcf_rate = self.fcf_rate(&fcf, &net_income)?;

        // 5. Projected FCF
        let rate = fcf_rate.rate;
        let projected_fcf = projected_net_income.map_values(|ni| ni * rate);
        check_series(projected_fcf.as_series(), "projected free cash flow")?;

        // 6–9. Terminal value and discounting
        let (cash_flows, terminal_value) = self.discount(&projected_fcf, r, g)?;
        let present_value = ensure_finite(
            cash_flows.iter().map(|cf| cf.present_value).sum(),
            "present value",
        )?;

        // 10. Per share, floored
        let per_share = ensure_finite(present_value / shares, "fair value per share")?;
        let fair_value_per_share = per_share.max(0.0);
        debug!(
            ticker = %company.ticker,
            present_value,
            terminal_value,
            fair_value_per_share,
            "computed DCF fair value"
        );

        Ok(DcfResult {
            fair_value_per_share,
            present_value,
            shares_outstanding: shares,
            terminal_value,
            required_return: r,
            perpetual_growth_rate: g,
            fcf_rate,
            cash_flows,
            historical: HistoricalSeries {
                free_cash_flow: fcf,
                revenue,
                net_income,
                net_income_margin: margin,
            },
            projected: ProjectedSeries {
                free_cash_flow: projected_fcf,
                revenue: projected_revenue,
                net_income: projected_net_income,
                net_income_margin: projected_margin,
            },
            dropped_periods: aligned.dropped,
            forecast_method: self.forecaster.name().to_string(),
        })
    }

    fn check_rates(&self, r: f64, g: f64) -> Result<(), ValuationError> {
        if !g.is_finite() {
            return Err(ValuationError::InvalidParameters(format!(
                "perpetual growth rate must be finite, got {g}"
            )));
        }
        if r - g <= self.config.min_rate_spread {
            return Err(ValuationError::InvalidParameters(format!(
                "required return ({r}) must exceed perpetual growth rate ({g})"
            )));
        }
        Ok(())
    }

    /// Mean of FCF / net income, or the median when the ratios are dispersed.
    pub fn fcf_rate(
        &self,
        fcf: &FinancialTimeSeries,
        net_income: &FinancialTimeSeries,
    ) -> Result<FcfRate, ValuationError> {
        let ratios = fcf.zip_with(net_income, |f, ni| f / ni)?;
        if let Some(bad) = ratios.iter().find(|o| !o.is_present()) {
            return Err(ValuationError::computation(
                "free cash flow rate",
                format!("net income is zero at {}", bad.period),
            ));
        }

        let values = ratios.values();
        let dispersion = sample_std_dev(&values);
        let (statistic, rate) = if dispersion > self.config.fcf_dispersion_threshold {
            (FcfRateStatistic::Median, median(&values))
        } else {
            (FcfRateStatistic::Mean, mean(&values))
        };
        let rate = ensure_finite(rate, "free cash flow rate")?;

        Ok(FcfRate {
            rate,
            statistic,
            dispersion,
            ratios,
        })
    }

    /// Discount projected FCF (year k at (1+r)^k) and the terminal value.
    fn discount(
        &self,
        projected_fcf: &ForecastResult,
        r: f64,
        g: f64,
    ) -> Result<(Vec<DiscountedCashFlow>, f64), ValuationError> {
        let furthest = projected_fcf
            .furthest()
            .ok_or_else(|| ValuationError::computation("terminal value", "empty forecast"))?;

        let terminal_value = ensure_finite(
            furthest.value * (1.0 + g) / (r - g),
            "terminal value",
        )?;

        let mut cash_flows: Vec<DiscountedCashFlow> = projected_fcf
            .iter()
            .enumerate()
            .map(|(i, obs)| discounted(obs.period, obs.value, (i + 1) as u32, r, false))
            .collect();

        let final_horizon = cash_flows.len() as u32;
        let terminal_horizon = match self.config.terminal_discounting {
            TerminalDiscounting::SharedFinalHorizon => final_horizon,
            TerminalDiscounting::YearAfterHorizon => final_horizon + 1,
        };
        cash_flows.push(discounted(
            furthest.period,
            terminal_value,
            terminal_horizon,
            r,
            true,
        ));

        for cf in &cash_flows {
            ensure_finite(cf.present_value, "discounting")?;
        }
        Ok((cash_flows, terminal_value))
    }
}

fn discounted(period: Period, cash_flow: f64, horizon: u32, r: f64, is_terminal: bool) -> DiscountedCashFlow {
    let discount_factor = (1.0 + r).powi(horizon as i32);
    DiscountedCashFlow {
        period,
        cash_flow,
        horizon,
        discount_factor,
        present_value: cash_flow / discount_factor,
        is_terminal,
    }
}

fn check_series(series: &FinancialTimeSeries, step: &str) -> Result<(), ValuationError> {
    match series.iter().find(|o| !o.is_present()) {
        Some(bad) => Err(ValuationError::computation(
            step,
            format!("non-finite value at {}", bad.period),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForecastMethod;
    use crate::domain::MarketQuote;
    use crate::stats::assert_approx;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn company(fcf: &[f64], revenue: &[f64], net_income: &[f64], shares: f64) -> CompanyFundamentals {
        let latest = d("2023-12-31");
        CompanyFundamentals {
            ticker: "TEST".into(),
            free_cash_flow: FinancialTimeSeries::from_recent_first(latest, fcf).unwrap(),
            total_revenue: FinancialTimeSeries::from_recent_first(latest, revenue).unwrap(),
            net_income: FinancialTimeSeries::from_recent_first(latest, net_income).unwrap(),
            quote: MarketQuote {
                shares_outstanding: Some(shares),
                ..MarketQuote::default()
            },
            ..CompanyFundamentals::default()
        }
    }

    fn rate(r: f64) -> DiscountRate {
        DiscountRate::new(r).unwrap()
    }

    fn engine() -> DcfEngine {
        DcfEngine::new(&ValuationConfig::default())
    }

    #[test]
    fn flat_company_matches_hand_computation() {
        let c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();

        assert_eq!(res.fcf_rate.statistic, FcfRateStatistic::Mean);
        assert_approx(res.fcf_rate.rate, 0.9, 1e-12);
        for v in res.projected.free_cash_flow.values() {
            assert_approx(v, 18.0, 1e-6);
        }
        // TV = 18 * 1.025 / 0.075 = 246
        assert_approx(res.terminal_value, 246.0, 1e-5);
        // Σ 18/1.1^k (k=1..5) + 246/1.1^5
        assert_approx(res.present_value, 220.980807, 1e-4);
        assert_approx(res.fair_value_per_share, 2.20980807, 1e-6);
    }

    #[test]
    fn terminal_value_shares_final_exponent_by_default() {
        let c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();

        assert_eq!(res.cash_flows.len(), 6);
        let horizons: Vec<u32> = res.cash_flows.iter().map(|cf| cf.horizon).collect();
        assert_eq!(horizons, vec![1, 2, 3, 4, 5, 5]);
        let terminal = res.cash_flows.last().unwrap();
        assert!(terminal.is_terminal);
        assert_eq!(terminal.period, d("2028-12-31"));
        assert_approx(terminal.discount_factor, 1.1_f64.powi(5), 1e-12);
    }

    #[test]
    fn year_after_horizon_discounts_terminal_once_more() {
        let mut config = ValuationConfig::default();
        config.dcf.terminal_discounting = TerminalDiscounting::YearAfterHorizon;
        let c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        let res = DcfEngine::new(&config)
            .compute_fair_value(&c, rate(0.10), 0.025)
            .unwrap();
        assert_eq!(res.cash_flows.last().unwrap().horizon, 6);
        // Σ 18/1.1^k + 246/1.1^6
        assert_approx(res.fair_value_per_share, 2.07094749, 1e-6);
    }

    #[test]
    fn equal_rates_are_invalid() {
        let c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        let err = engine().compute_fair_value(&c, rate(0.05), 0.05).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidParameters(_)));
        let err = engine().compute_fair_value(&c, rate(0.05), 0.06).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidParameters(_)));
        let err = engine()
            .compute_fair_value(&c, rate(0.05), f64::NAN)
            .unwrap_err();
        assert!(matches!(err, ValuationError::InvalidParameters(_)));
    }

    #[test]
    fn negative_value_is_floored() {
        let c = company(&[-30.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();
        assert!(res.present_value < 0.0);
        assert_eq!(res.fair_value_per_share, 0.0);
    }

    #[test]
    fn dispersed_ratios_use_median() {
        // Ratios (oldest first): 1, 1, 5, 1, 0.5 → std > 1
        let c = company(
            &[5.0, 10.0, 50.0, 10.0, 10.0],
            &[100.0; 5],
            &[10.0; 5],
            100.0,
        );
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();
        assert_eq!(res.fcf_rate.statistic, FcfRateStatistic::Median);
        assert_approx(res.fcf_rate.rate, 1.0, 1e-12);
        assert!(res.fcf_rate.dispersion > 1.0);
    }

    #[test]
    fn zero_net_income_is_a_computation_error() {
        let c = company(&[5.0; 4], &[100.0; 4], &[10.0, 0.0, 10.0, 10.0], 100.0);
        let err = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap_err();
        assert!(matches!(err, ValuationError::ComputationError { .. }));
    }

    #[test]
    fn missing_shares_is_data_unavailable() {
        let mut c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        c.quote.shares_outstanding = None;
        let err = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap_err();
        assert!(matches!(err, ValuationError::DataUnavailable { .. }));
        assert!(err.to_string().contains("shares_outstanding"));
    }

    #[test]
    fn missing_series_is_data_unavailable() {
        let mut c = company(&[18.0; 5], &[100.0; 5], &[20.0; 5], 100.0);
        c.free_cash_flow = FinancialTimeSeries::default();
        let err = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap_err();
        assert!(err.to_string().contains("free_cash_flow"));
    }

    #[test]
    fn incomplete_periods_are_dropped() {
        let mut c = company(
            &[18.0, 14.0, 10.0, 6.0, 2.0],
            &[100.0, 90.0, 80.0, 70.0, 60.0],
            &[20.0, 16.0, 12.0, 8.0, 4.0],
            100.0,
        );
        c.total_revenue = FinancialTimeSeries::from_recent_first(
            d("2023-12-31"),
            &[100.0, f64::NAN, 80.0, 70.0, 60.0],
        )
        .unwrap();
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();
        assert_eq!(res.dropped_periods, vec![d("2022-12-31")]);
        assert_eq!(res.historical.revenue.len(), 4);
    }

    #[test]
    fn one_complete_period_is_invalid() {
        let c = company(&[18.0], &[100.0], &[20.0], 100.0);
        let err = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidParameters(_)));
    }

    #[test]
    fn linear_method_is_selectable() {
        let mut config = ValuationConfig::default();
        config.forecast.method = ForecastMethod::Linear;
        let c = company(
            &[18.0, 14.0, 10.0, 6.0, 2.0],
            &[100.0, 90.0, 80.0, 70.0, 60.0],
            &[20.0, 16.0, 12.0, 8.0, 4.0],
            100.0,
        );
        let res = DcfEngine::new(&config)
            .compute_fair_value(&c, rate(0.10), 0.025)
            .unwrap();
        assert_eq!(res.forecast_method, "linear");
        // Revenue line continues 110, 120, ...
        assert_approx(res.projected.revenue.values()[0], 110.0, 1e-9);
        assert_approx(res.projected.revenue.values()[4], 150.0, 1e-9);
    }

    #[test]
    fn present_value_is_sum_of_discounted_flows() {
        let c = company(
            &[18.0, 14.0, 10.0, 6.0, 2.0],
            &[100.0, 90.0, 80.0, 70.0, 60.0],
            &[20.0, 16.0, 12.0, 8.0, 4.0],
            100.0,
        );
        let res = engine().compute_fair_value(&c, rate(0.10), 0.025).unwrap();
        let fcf = res.projected.free_cash_flow.values();
        let mut expected = 0.0;
        for (k, v) in fcf.iter().enumerate() {
            expected += v / 1.1_f64.powi(k as i32 + 1);
        }
        expected += res.terminal_value / 1.1_f64.powi(5);
        assert_approx(res.present_value, expected, 1e-9);
        assert_approx(
            res.terminal_value,
            fcf[4] * 1.025 / 0.075,
            1e-9,
        );
    }
}
