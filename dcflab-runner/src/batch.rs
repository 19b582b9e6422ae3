//! Batch valuation: many tickers in parallel.
//!
//! Each ticker is an independent request; a failure is recorded next to its
//! ticker and never aborts the rest of the batch.

use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use dcflab_core::data::DataProvider;
use dcflab_core::ValuationConfig;

use crate::pipeline::{value_ticker, RunError, ValuationRequest};
use crate::report::ValuationReport;

/// Outcome for one ticker in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    pub ticker: String,
    pub outcome: Result<ValuationReport, RunError>,
}

/// One row of the batch summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRow {
    pub ticker: String,
    pub fair_value_per_share: Option<f64>,
    pub current_price: Option<f64>,
    pub upside: Option<f64>,
    pub required_return: Option<f64>,
    pub error: Option<String>,
}

/// Results of a batch, in request order.
#[derive(Debug)]
pub struct BatchResults {
    pub entries: Vec<BatchEntry>,
}

impl BatchResults {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn reports(&self) -> impl Iterator<Item = &ValuationReport> {
        self.entries.iter().filter_map(|e| e.outcome.as_ref().ok())
    }

    pub fn rows(&self) -> Vec<BatchRow> {
        self.entries
            .iter()
            .map(|e| match &e.outcome {
                Ok(r) => BatchRow {
                    ticker: e.ticker.clone(),
                    fair_value_per_share: Some(r.fair_value_per_share),
                    current_price: r.current_price,
                    upside: r.upside,
                    required_return: Some(r.required_return),
                    error: None,
                },
                Err(err) => BatchRow {
                    ticker: e.ticker.clone(),
                    fair_value_per_share: None,
                    current_price: None,
                    upside: None,
                    required_return: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }

    /// Successful reports, highest upside first. Reports without a price go last.
    pub fn ranked_by_upside(&self) -> Vec<&ValuationReport> {
        let mut reports: Vec<&ValuationReport> = self.reports().collect();
        reports.sort_by(|a, b| {
            let key = |r: &ValuationReport| r.upside.unwrap_or(f64::NEG_INFINITY);
            key(b).total_cmp(&key(a)).then_with(|| a.ticker.cmp(&b.ticker))
        });
        reports
    }
}

/// Value every request, in parallel unless `parallel` is false.
pub fn value_batch(
    provider: &dyn DataProvider,
    config: &ValuationConfig,
    requests: &[ValuationRequest],
    parallel: bool,
) -> BatchResults {
    let run = |request: &ValuationRequest| {
        let outcome = value_ticker(provider, config, request);
        if let Err(e) = &outcome {
            warn!(ticker = %request.ticker, error = %e, "valuation failed");
        }
        BatchEntry {
            ticker: request.ticker.clone(),
            outcome,
        }
    };

    let entries = if parallel {
        requests.par_iter().map(run).collect()
    } else {
        requests.iter().map(run).collect()
    };

    BatchResults { entries }
}

/// Batch summary as CSV.
pub fn export_batch_csv(results: &BatchResults) -> anyhow::Result<String> {
    use anyhow::Context;

    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in results.rows() {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}
