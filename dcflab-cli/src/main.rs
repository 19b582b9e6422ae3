//! DCF Lab CLI: value, wacc, forecast and batch commands.
//!
//! Commands:
//! - `value`: DCF fair value for one ticker, optional artifact export
//! - `wacc`: cost of capital breakdown and the suggested required return
//! - `forecast`: project a comma-separated series five years forward
//! - `batch`: value many tickers in parallel and rank them by upside
//!
//! Fundamentals come from Yahoo Finance unless `--data-dir` points at a
//! directory of snapshot files. Logs go to stderr (`RUST_LOG`, default `warn`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dcflab_core::data::{CircuitBreaker, DataProvider, FileProvider, YahooProvider};
use dcflab_core::forecast::forecaster_for;
use dcflab_core::{
    CompanyFundamentals, FinancialTimeSeries, ForecastMethod, ValuationConfig, WaccEstimate,
    WaccEstimator,
};
use dcflab_runner::{
    export_batch_csv, render_text, save_artifacts, value_batch, value_ticker, ValuationRequest,
};

#[derive(Parser)]
#[command(
    name = "dcflab",
    about = "DCF Lab CLI: discounted cash flow fair value from reported fundamentals"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the fair value per share of one company.
    Value {
        /// Ticker symbol (e.g., MCD).
        ticker: String,

        /// Perpetual growth rate in [0.005, 0.050]. Defaults to the config value (0.025).
        #[arg(long)]
        growth: Option<f64>,

        /// Required return in [0.01, 0.20]. Defaults to the WACC when it is plausible.
        #[arg(long)]
        required_return: Option<f64>,

        /// Risk-free rate, overriding the provider's treasury yield.
        #[arg(long)]
        risk_free: Option<f64>,

        /// Forecasting method: damped or linear.
        #[arg(long)]
        method: Option<ForecastMethod>,

        /// Directory of `<TICKER>.json` / `<TICKER>.toml` snapshots. Uses Yahoo Finance when absent.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Valuation config TOML.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write report.json and CSV series under this directory.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Print the full report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the WACC breakdown for one company.
    Wacc {
        /// Ticker symbol.
        ticker: String,

        /// Risk-free rate, overriding the provider's treasury yield.
        #[arg(long)]
        risk_free: Option<f64>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Project an annual series five years forward.
    Forecast {
        /// Values, most recent first (e.g., 100,90,80).
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        values: Vec<f64>,

        /// Period end of the most recent value (YYYY-MM-DD).
        #[arg(long)]
        latest: String,

        /// Forecasting method: damped or linear.
        #[arg(long)]
        method: Option<ForecastMethod>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Value several tickers in parallel.
    Batch {
        /// Ticker symbols.
        #[arg(required = true)]
        tickers: Vec<String>,

        #[arg(long)]
        growth: Option<f64>,

        #[arg(long)]
        method: Option<ForecastMethod>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the summary table as CSV to this file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Value one ticker at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Value {
            ticker,
            growth,
            required_return,
            risk_free,
            method,
            data_dir,
            config,
            export,
            json,
        } => {
            let mut request = ValuationRequest::new(ticker);
            request.perpetual_growth_rate = growth;
            request.required_return = required_return;
            request.risk_free_rate = risk_free;
            run_value(
                request,
                method,
                data_dir.as_deref(),
                config.as_deref(),
                export.as_deref(),
                json,
            )
        }
        Commands::Wacc {
            ticker,
            risk_free,
            data_dir,
            config,
            json,
        } => run_wacc(&ticker, risk_free, data_dir.as_deref(), config.as_deref(), json),
        Commands::Forecast {
            values,
            latest,
            method,
            config,
        } => run_forecast(&values, &latest, method, config.as_deref()),
        Commands::Batch {
            tickers,
            growth,
            method,
            data_dir,
            config,
            csv,
            sequential,
        } => run_batch(
            tickers,
            growth,
            method,
            data_dir.as_deref(),
            config.as_deref(),
            csv.as_deref(),
            !sequential,
        ),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>, method: Option<ForecastMethod>) -> Result<ValuationConfig> {
    let mut config = match path {
        Some(p) => ValuationConfig::from_file(p)?,
        None => ValuationConfig::default(),
    };
    if let Some(m) = method {
        config.forecast.method = m;
    }
    Ok(config)
}

fn make_provider(data_dir: Option<&Path>) -> Result<Box<dyn DataProvider>> {
    match data_dir {
        Some(dir) => {
            if !dir.is_dir() {
                bail!("data directory does not exist: {}", dir.display());
            }
            Ok(Box::new(FileProvider::new(dir)))
        }
        None => {
            let circuit_breaker = Arc::new(CircuitBreaker::default_provider());
            Ok(Box::new(YahooProvider::new(circuit_breaker)?))
        }
    }
}

fn run_value(
    request: ValuationRequest,
    method: Option<ForecastMethod>,
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
    export_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, method)?;
    let provider = make_provider(data_dir)?;

    let report = value_ticker(provider.as_ref(), &config, &request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report));
    }

    if let Some(dir) = export_dir {
        let run_dir = save_artifacts(&report, dir)?;
        eprintln!("Artifacts saved to: {}", run_dir.display());
    }

    Ok(())
}

fn run_wacc(
    ticker: &str,
    risk_free: Option<f64>,
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path, None)?;
    let provider = make_provider(data_dir)?;

    let company = provider.fundamentals(&ticker.to_ascii_uppercase())?;
    let estimator = WaccEstimator::new(config.wacc.clone());
    let estimate = estimate_wacc(&estimator, provider.as_ref(), &company, risk_free);

    if json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    println!("{} WACC: {:.2}%", company.ticker, estimate.wacc * 100.0);
    match (&estimate.breakdown, &estimate.fallback_reason) {
        (Some(b), _) => {
            println!("  Risk-free rate:   {:.2}%", b.risk_free_rate * 100.0);
            println!("  Beta:             {:.2}", b.beta);
            println!("  Cost of equity:   {:.2}%", b.cost_of_equity * 100.0);
            println!("  Weight of equity: {:.4}", b.weight_of_equity);
            println!("  Weight of debt:   {:.2}", b.weight_of_debt);
            println!("  Cost of debt:     {:.2}%", b.cost_of_debt * 100.0);
            println!("  Tax rate:         {:.2}%", b.tax_rate * 100.0);
        }
        (None, Some(reason)) => println!("  Fallback rate used: {reason}"),
        (None, None) => {}
    }
    println!(
        "Suggested required return: {:.2}%",
        estimator.suggested_required_return(estimate.wacc) * 100.0
    );

    Ok(())
}

/// WACC for `company`. Without a treasury yield the estimate falls back and
/// carries the reason, as in the valuation pipeline.
fn estimate_wacc(
    estimator: &WaccEstimator,
    provider: &dyn DataProvider,
    company: &CompanyFundamentals,
    risk_free: Option<f64>,
) -> WaccEstimate {
    let rf = match risk_free {
        Some(rf) => rf,
        None => provider.risk_free_rate().unwrap_or_else(|e| {
            warn!(error = %e, "risk-free rate unavailable");
            f64::NAN
        }),
    };
    estimator.estimate_detailed(company, rf)
}

fn run_forecast(
    values: &[f64],
    latest: &str,
    method: Option<ForecastMethod>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path, method)?;
    let latest = NaiveDate::parse_from_str(latest, "%Y-%m-%d")
        .with_context(|| format!("invalid --latest date '{latest}', expected YYYY-MM-DD"))?;

    let history = FinancialTimeSeries::from_recent_first(latest, values)?;
    let forecaster = forecaster_for(&config.forecast);
    let projected = forecaster.forecast(&history)?;

    println!("Method: {}", forecaster.name());
    for obs in projected.iter() {
        println!("{}  {:.4}", obs.period, obs.value);
    }
    Ok(())
}

fn run_batch(
    tickers: Vec<String>,
    growth: Option<f64>,
    method: Option<ForecastMethod>,
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
    csv_path: Option<&Path>,
    parallel: bool,
) -> Result<()> {
    let config = load_config(config_path, method)?;
    let provider = make_provider(data_dir)?;

    let requests: Vec<ValuationRequest> = tickers
        .into_iter()
        .map(|t| {
            let mut r = ValuationRequest::new(t);
            r.perpetual_growth_rate = growth;
            r
        })
        .collect();

    let results = value_batch(provider.as_ref(), &config, &requests, parallel);

    println!(
        "{:<8} {:>12} {:>12} {:>9} {:>9}",
        "Ticker", "Fair value", "Price", "Upside", "Rate"
    );
    for report in results.ranked_by_upside() {
        let price = report
            .current_price
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "-".into());
        let upside = report
            .upside
            .map(|u| format!("{:+.1}%", u * 100.0))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<8} {:>12.2} {:>12} {:>9} {:>8.2}%",
            report.ticker,
            report.fair_value_per_share,
            price,
            upside,
            report.required_return * 100.0
        );
    }
    for entry in &results.entries {
        if let Err(e) = &entry.outcome {
            eprintln!("Error for {}: {e}", entry.ticker);
        }
    }
    println!(
        "\nBatch complete: {}/{} succeeded, {} failed",
        results.succeeded(),
        results.entries.len(),
        results.failed()
    );

    if let Some(path) = csv_path {
        std::fs::write(path, export_batch_csv(&results)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    if results.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
