//! Yahoo Finance data provider.
//!
//! Fundamentals come from two unofficial endpoints:
//! - `ws/fundamentals-timeseries` for the annual statement line items
//! - `v10/finance/quoteSummary` for beta, price, share count and multiples
//!
//! The risk-free rate is the previous close of the 10-year treasury yield
//! index (`^TNX`, quoted in percent) from the v8 chart API.
//!
//! Yahoo Finance has no official API and is subject to unannounced format
//! changes. The snapshot file provider is the fallback when Yahoo is unavailable.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, DataProvider};
use super::TREASURY_SYMBOL;
use crate::domain::{
    BalanceSheet, CompanyFundamentals, FinancialTimeSeries, IncomeStatement, MarketQuote,
};

const BASE_URL: &str = "https://query2.finance.yahoo.com";

// Annual statement line items requested from the timeseries endpoint.
const FREE_CASH_FLOW: &str = "annualFreeCashFlow";
const TOTAL_REVENUE: &str = "annualTotalRevenue";
const NET_INCOME: &str = "annualNetIncome";
const STOCKHOLDERS_EQUITY: &str = "annualStockholdersEquity";
const TOTAL_ASSETS: &str = "annualTotalAssets";
const TOTAL_LIABILITIES: &str = "annualTotalLiabilitiesNetMinorityInterest";
const INTEREST_EXPENSE: &str = "annualInterestExpense";
const TAX_PROVISION: &str = "annualTaxProvision";
const PRETAX_INCOME: &str = "annualPretaxIncome";

const LINE_ITEMS: [&str; 9] = [
    FREE_CASH_FLOW,
    TOTAL_REVENUE,
    NET_INCOME,
    STOCKHOLDERS_EQUITY,
    TOTAL_ASSETS,
    TOTAL_LIABILITIES,
    INTEREST_EXPENSE,
    TAX_PROVISION,
    PRETAX_INCOME,
];

const QUOTE_MODULES: &str = "summaryDetail,financialData,defaultKeyStatistics";

// Earliest timestamp requested from the timeseries endpoint (1985-08-23).
const TIMESERIES_START: i64 = 493_590_046;

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct TimeseriesResponse {
    timeseries: Envelope<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: Envelope<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Envelope<ChartData>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<Vec<T>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeseriesPoint {
    as_of_date: NaiveDate,
    reported_value: Option<ReportedValue>,
}

#[derive(Debug, Deserialize)]
struct ReportedValue {
    raw: Option<f64>,
}

impl<T> Envelope<T> {
    /// The result array, or the error Yahoo reported in its place.
    fn into_result(self, symbol: &str) -> Result<Vec<T>, DataError> {
        match (self.result, self.error) {
            (Some(result), _) if !result.is_empty() => Ok(result),
            (_, Some(err)) if err.code == "Not Found" => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            (_, Some(err)) => Err(DataError::ResponseFormatChanged(format!(
                "{}: {}",
                err.code, err.description
            ))),
            _ => Err(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
        }
    }
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    fn timeseries_url(symbol: &str, period2: i64) -> String {
        format!(
            "{BASE_URL}/ws/fundamentals-timeseries/v1/finance/timeseries/{}\
             ?type={}&period1={TIMESERIES_START}&period2={period2}",
            encode_symbol(symbol),
            LINE_ITEMS.join(",")
        )
    }

    fn quote_summary_url(symbol: &str) -> String {
        format!(
            "{BASE_URL}/v10/finance/quoteSummary/{}?modules={QUOTE_MODULES}",
            encode_symbol(symbol)
        )
    }

    fn chart_url(symbol: &str) -> String {
        format!(
            "{BASE_URL}/v8/finance/chart/{}?range=5d&interval=1d",
            encode_symbol(symbol)
        )
    }

    /// GET `url` and decode the JSON body, with retry and circuit breaker logic.
    fn get_json<T: DeserializeOwned>(&self, url: &str, symbol: &str) -> Result<T, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                warn!(
                    symbol,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = ?last_error,
                    "retrying Yahoo request"
                );
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                self.circuit_breaker.trip();
                return Err(DataError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(DataError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(DataError::AuthenticationRequired(
                    "Yahoo Finance requires authentication".into(),
                ));
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(DataError::Other(format!("HTTP {status} for {symbol}")));
                continue;
            }

            let body = resp.json::<T>().map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "failed to parse response for {symbol}: {e}"
                ))
            })?;
            self.circuit_breaker.record_success();
            return Ok(body);
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, DataError> {
        let symbol = ticker.to_ascii_uppercase();

        let timeseries: TimeseriesResponse = self.get_json(
            &Self::timeseries_url(&symbol, Utc::now().timestamp()),
            &symbol,
        )?;
        let mut statements = parse_timeseries(&symbol, timeseries)?;

        let summary: QuoteSummaryResponse =
            self.get_json(&Self::quote_summary_url(&symbol), &symbol)?;
        let quote = parse_quote_summary(&symbol, summary)?;

        debug!(
            symbol = %symbol,
            line_items = statements.len(),
            "fetched Yahoo fundamentals"
        );
        Ok(assemble(&symbol, &mut statements, quote))
    }

    fn risk_free_rate(&self) -> Result<f64, DataError> {
        let chart: ChartResponse = self.get_json(&Self::chart_url(TREASURY_SYMBOL), TREASURY_SYMBOL)?;
        parse_treasury_yield(chart)
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}

fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E")
}

/// Line item name → annual series.
fn parse_timeseries(
    symbol: &str,
    resp: TimeseriesResponse,
) -> Result<HashMap<String, FinancialTimeSeries>, DataError> {
    let results = resp.timeseries.into_result(symbol)?;
    let mut out = HashMap::new();

    for entry in results {
        let Some(item) = entry
            .pointer("/meta/type/0")
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return Err(DataError::ResponseFormatChanged(
                "timeseries entry without meta.type".into(),
            ));
        };

        // Yahoo omits the data key entirely for items the company never reported.
        let Some(points) = entry.get(&item) else {
            continue;
        };
        let points: Vec<Option<TimeseriesPoint>> = serde_json::from_value(points.clone())
            .map_err(|e| DataError::ResponseFormatChanged(format!("{item}: {e}")))?;

        let series = FinancialTimeSeries::new(points.into_iter().flatten().map(|p| {
            let value = p.reported_value.and_then(|v| v.raw).unwrap_or(f64::NAN);
            (p.as_of_date, value)
        }))
        .map_err(|e| DataError::ResponseFormatChanged(format!("{item}: {e}")))?;

        out.insert(item, series);
    }

    if out.is_empty() {
        return Err(DataError::SymbolNotFound {
            symbol: symbol.to_string(),
        });
    }
    Ok(out)
}

fn parse_quote_summary(symbol: &str, resp: QuoteSummaryResponse) -> Result<MarketQuote, DataError> {
    let result = resp
        .quote_summary
        .into_result(symbol)?
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("empty quoteSummary".into()))?;

    let raw = |path: &str| result.pointer(path).and_then(Value::as_f64);
    Ok(MarketQuote {
        beta: raw("/summaryDetail/beta/raw"),
        current_price: raw("/financialData/currentPrice/raw"),
        shares_outstanding: raw("/defaultKeyStatistics/sharesOutstanding/raw"),
        trailing_pe: raw("/summaryDetail/trailingPE/raw"),
        peg_ratio: raw("/defaultKeyStatistics/pegRatio/raw"),
        ev_to_ebitda: raw("/defaultKeyStatistics/enterpriseToEbitda/raw"),
    })
}

fn parse_treasury_yield(resp: ChartResponse) -> Result<f64, DataError> {
    let data = resp
        .chart
        .into_result(TREASURY_SYMBOL)?
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("empty chart result".into()))?;

    let meta = data.meta;
    meta.previous_close
        .or(meta.chart_previous_close)
        .or(meta.regular_market_price)
        .filter(|v| v.is_finite())
        .map(|percent| percent / 100.0)
        .ok_or_else(|| DataError::MissingLineItem {
            item: "previousClose".into(),
            ticker: TREASURY_SYMBOL.into(),
        })
}

fn assemble(
    symbol: &str,
    statements: &mut HashMap<String, FinancialTimeSeries>,
    quote: MarketQuote,
) -> CompanyFundamentals {
    let latest = |statements: &HashMap<String, FinancialTimeSeries>, item: &str| {
        statements.get(item).and_then(latest_reported)
    };

    let balance_sheet = BalanceSheet {
        stockholders_equity: latest(statements, STOCKHOLDERS_EQUITY),
        total_assets: latest(statements, TOTAL_ASSETS),
        total_liabilities: latest(statements, TOTAL_LIABILITIES),
    };
    let income_statement = IncomeStatement {
        interest_expense: latest(statements, INTEREST_EXPENSE),
        tax_provision: latest(statements, TAX_PROVISION),
        pretax_income: latest(statements, PRETAX_INCOME),
    };

    let mut take = |item: &str| statements.remove(item).unwrap_or_default();
    CompanyFundamentals {
        ticker: symbol.to_string(),
        free_cash_flow: take(FREE_CASH_FLOW),
        total_revenue: take(TOTAL_REVENUE),
        net_income: take(NET_INCOME),
        quote,
        balance_sheet,
        income_statement,
    }
}

/// Value of the most recent period, when it was reported.
fn latest_reported(series: &FinancialTimeSeries) -> Option<f64> {
    series.latest().filter(|o| o.is_present()).map(|o| o.value)
}
