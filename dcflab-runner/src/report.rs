//! Valuation report: the persisted and printed outcome of one request.

use serde::{Deserialize, Serialize};

use dcflab_core::domain::CompanyFundamentals;
use dcflab_core::fingerprint::ValuationFingerprint;
use dcflab_core::{DcfResult, ValuationConfig, WaccEstimate};

use crate::pipeline::RateSource;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Fair value against the market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Undervalued,
    Overvalued,
}

/// Market multiples reported next to the fair value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multiples {
    pub trailing_pe: Option<f64>,
    pub peg_ratio: Option<f64>,
    pub ev_to_ebitda: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub ticker: String,
    pub fingerprint: ValuationFingerprint,
    /// None when the provider had no treasury yield.
    pub risk_free_rate: Option<f64>,
    pub wacc: WaccEstimate,
    pub required_return: f64,
    pub required_return_source: RateSource,
    pub perpetual_growth_rate: f64,
    pub fair_value_per_share: f64,
    pub current_price: Option<f64>,
    pub verdict: Option<Verdict>,
    /// fair value / price − 1
    pub upside: Option<f64>,
    pub multiples: Multiples,
    pub dcf: DcfResult,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ValuationReport {
    pub fn new(
        company: &CompanyFundamentals,
        config: &ValuationConfig,
        risk_free_rate: Option<f64>,
        wacc: WaccEstimate,
        required_return_source: RateSource,
        dcf: DcfResult,
    ) -> Self {
        let fair_value = dcf.fair_value_per_share;
        let current_price = company
            .quote
            .current_price
            .filter(|p| p.is_finite() && *p > 0.0);
        let verdict = current_price.map(|p| {
            if fair_value > p {
                Verdict::Undervalued
            } else {
                Verdict::Overvalued
            }
        });

        Self {
            schema_version: SCHEMA_VERSION,
            ticker: company.ticker.clone(),
            fingerprint: ValuationFingerprint::new(
                company,
                config,
                dcf.required_return,
                dcf.perpetual_growth_rate,
            ),
            risk_free_rate,
            wacc,
            required_return: dcf.required_return,
            required_return_source,
            perpetual_growth_rate: dcf.perpetual_growth_rate,
            fair_value_per_share: fair_value,
            current_price,
            verdict,
            upside: current_price.map(|p| fair_value / p - 1.0),
            multiples: Multiples {
                trailing_pe: company.quote.trailing_pe,
                peg_ratio: company.quote.peg_ratio,
                ev_to_ebitda: company.quote.ev_to_ebitda,
            },
            dcf,
        }
    }
}

/// Plain-text summary for terminal output.
pub fn render_text(report: &ValuationReport) -> String {
    let mut out = String::with_capacity(1024);

    out.push_str(&format!(
        "{} fair value: {:.2}\n",
        report.ticker, report.fair_value_per_share
    ));
    if let Some(price) = report.current_price {
        out.push_str(&format!("Current price: {price:.2}"));
        if let (Some(verdict), Some(upside)) = (report.verdict, report.upside) {
            let label = match verdict {
                Verdict::Undervalued => "undervalued",
                Verdict::Overvalued => "overvalued",
            };
            out.push_str(&format!(" ({label}, {:+.1}%)", upside * 100.0));
        }
        out.push('\n');
    }

    for (name, value) in [
        ("PEG ratio", report.multiples.peg_ratio),
        ("P/E ratio", report.multiples.trailing_pe),
        ("EV/EBITDA", report.multiples.ev_to_ebitda),
    ] {
        if let Some(v) = value {
            out.push_str(&format!("{name}: {v:.2}\n"));
        }
    }

    out.push('\n');
    let source = match report.required_return_source {
        RateSource::Override => "user",
        RateSource::Wacc => "WACC",
        RateSource::Fallback => "fallback",
    };
    out.push_str(&format!(
        "Required return: {:.2}% ({source})\n",
        report.required_return * 100.0
    ));
    match &report.wacc.fallback_reason {
        None => out.push_str(&format!("WACC: {:.2}%\n", report.wacc.wacc * 100.0)),
        Some(reason) => out.push_str(&format!(
            "WACC: {:.2}% (fallback: {reason})\n",
            report.wacc.wacc * 100.0
        )),
    }
    out.push_str(&format!(
        "Perpetual growth: {:.2}%\n",
        report.perpetual_growth_rate * 100.0
    ));

    let dcf = &report.dcf;
    out.push_str(&format!(
        "FCF rate: {:.4} ({:?}, dispersion {:.4})\n",
        dcf.fcf_rate.rate, dcf.fcf_rate.statistic, dcf.fcf_rate.dispersion
    ));
    out.push_str(&format!("Forecast method: {}\n", dcf.forecast_method));
    if !dcf.dropped_periods.is_empty() {
        let dropped: Vec<String> = dcf.dropped_periods.iter().map(|p| p.to_string()).collect();
        out.push_str(&format!("Dropped periods: {}\n", dropped.join(", ")));
    }

    out.push_str("\nYear        Revenue   Net income          FCF   PV factor\n");
    let revenue = dcf.projected.revenue.values();
    let net_income = dcf.projected.net_income.values();
    for (i, cf) in dcf.cash_flows.iter().filter(|cf| !cf.is_terminal).enumerate() {
        out.push_str(&format!(
            "{}  {:>12.2} {:>12.2} {:>12.2} {:>11.4}\n",
            cf.period,
            revenue.get(i).copied().unwrap_or(f64::NAN),
            net_income.get(i).copied().unwrap_or(f64::NAN),
            cf.cash_flow,
            1.0 / cf.discount_factor,
        ));
    }
    out.push_str(&format!("Terminal value: {:.2}\n", dcf.terminal_value));
    out.push_str(&format!("Present value: {:.2}\n", dcf.present_value));

    out
}
