//! Export: JSON report and CSV series artifacts.
//!
//! - **JSON**: the full `ValuationReport`, schema versioned
//! - **CSV**: historical and projected series in long format for charting tools
//!
//! Artifacts are write-only from the valuation's point of view; no valuation
//! ever reads them back.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dcflab_core::domain::FinancialTimeSeries;

use crate::report::{ValuationReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ValuationReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ValuationReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ValuationReport> {
    let report: ValuationReport =
        serde_json::from_str(json).context("failed to deserialize ValuationReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export every series of the valuation as CSV.
///
/// Columns: period, series, kind (historical | projected), value.
/// Rows run oldest first within each series.
pub fn export_series_csv(report: &ValuationReport) -> Result<String> {
    let dcf = &report.dcf;
    let h = &dcf.historical;
    let p = &dcf.projected;

    let sections: [(&str, &str, &FinancialTimeSeries); 8] = [
        ("free_cash_flow", "historical", &h.free_cash_flow),
        ("free_cash_flow", "projected", p.free_cash_flow.as_series()),
        ("total_revenue", "historical", &h.revenue),
        ("total_revenue", "projected", p.revenue.as_series()),
        ("net_income", "historical", &h.net_income),
        ("net_income", "projected", p.net_income.as_series()),
        ("net_income_margin", "historical", &h.net_income_margin),
        ("net_income_margin", "projected", p.net_income_margin.as_series()),
    ];

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["period", "series", "kind", "value"])?;
    for (series, kind, data) in sections {
        for obs in data.iter() {
            let period = obs.period.to_string();
            let value = format!("{:.6}", obs.value);
            wtr.write_record([period.as_str(), series, kind, value.as_str()])?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the discounting schedule as CSV.
///
/// Columns: period, horizon, cash_flow, discount_factor, present_value, terminal
pub fn export_cash_flows_csv(report: &ValuationReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "period",
        "horizon",
        "cash_flow",
        "discount_factor",
        "present_value",
        "terminal",
    ])?;
    for cf in &report.dcf.cash_flows {
        wtr.write_record([
            &cf.period.to_string(),
            &cf.horizon.to_string(),
            &format!("{:.6}", cf.cash_flow),
            &format!("{:.6}", cf.discount_factor),
            &format!("{:.6}", cf.present_value),
            &cf.is_terminal.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one valuation.
///
/// Creates `{ticker}_{timestamp}/` under `output_dir` containing:
/// - `report.json`: the full `ValuationReport`
/// - `series.csv`: historical and projected series
/// - `cash_flows.csv`: discounting schedule
///
/// Returns the path to the created directory.
pub fn save_artifacts(report: &ValuationReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        report.ticker,
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("series.csv"), export_series_csv(report)?)?;
    std::fs::write(run_dir.join("cash_flows.csv"), export_cash_flows_csv(report)?)?;

    Ok(run_dir)
}
