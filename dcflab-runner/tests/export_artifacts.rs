use chrono::NaiveDate;
use dcflab_core::data::StaticProvider;
use dcflab_core::domain::MarketQuote;
use dcflab_core::{CompanyFundamentals, FinancialTimeSeries, ValuationConfig};
use dcflab_runner::export::export_cash_flows_csv;
use dcflab_runner::{
    export_json, export_series_csv, import_json, save_artifacts, value_ticker, ValuationReport,
    ValuationRequest, SCHEMA_VERSION,
};

fn make_report() -> ValuationReport {
    let latest = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let s = |v: &[f64]| FinancialTimeSeries::from_recent_first(latest, v).unwrap();
    let company = CompanyFundamentals {
        ticker: "ACME".into(),
        free_cash_flow: s(&[18.0, 14.0, 10.0, 6.0, 2.0]),
        total_revenue: s(&[100.0, 90.0, 80.0, 70.0, 60.0]),
        net_income: s(&[20.0, 16.0, 12.0, 8.0, 4.0]),
        quote: MarketQuote {
            shares_outstanding: Some(100.0),
            ..MarketQuote::default()
        },
        ..CompanyFundamentals::default()
    };
    let provider = StaticProvider::new(0.04).with_company(company);
    value_ticker(
        &provider,
        &ValuationConfig::default(),
        &ValuationRequest::new("ACME").with_required_return(0.10),
    )
    .unwrap()
}

#[test]
fn json_round_trip() {
    let report = make_report();
    let json = export_json(&report).unwrap();
    assert!(json.contains("\"schema_version\": 1"));
    let back = import_json(&json).unwrap();
    assert_eq!(back.ticker, report.ticker);
    assert_eq!(back.fingerprint, report.fingerprint);
    assert_eq!(back.required_return_source, report.required_return_source);
    assert_eq!(back.dcf.cash_flows.len(), report.dcf.cash_flows.len());
    assert_eq!(back.dcf.projected.revenue.periods(), report.dcf.projected.revenue.periods());
    assert!((back.fair_value_per_share - report.fair_value_per_share).abs() < 1e-12);
}

#[test]
fn newer_schema_is_rejected() {
    let report = make_report();
    let json = export_json(&report)
        .unwrap()
        .replace("\"schema_version\": 1", &format!("\"schema_version\": {}", SCHEMA_VERSION + 1));
    let err = import_json(&json).unwrap_err();
    assert!(err.to_string().contains("unsupported schema version"));
}

#[test]
fn series_csv_has_history_and_projection() {
    let csv = export_series_csv(&make_report()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "period,series,kind,value");
    // 4 series × (5 historical + 5 projected)
    assert_eq!(lines.len(), 1 + 4 * 10);
    assert_eq!(lines[1], "2019-12-31,free_cash_flow,historical,2.000000");
    assert!(lines.contains(&"2023-12-31,total_revenue,historical,100.000000"));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("2028-12-31,net_income_margin,projected,")));
}

#[test]
fn cash_flow_csv_marks_terminal() {
    let csv = export_cash_flows_csv(&make_report()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 1 + 6);
    assert!(lines[1].starts_with("2024-12-31,1,"));
    assert!(lines[1].ends_with(",false"));
    assert!(lines[6].starts_with("2028-12-31,5,"));
    assert!(lines[6].ends_with(",true"));
}

#[test]
fn save_artifacts_writes_bundle() {
    let temp_dir = tempfile::tempdir().unwrap();
    let report = make_report();
    let dir = save_artifacts(&report, temp_dir.path()).unwrap();

    let name = dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("ACME_"));
    for file in ["report.json", "series.csv", "cash_flows.csv"] {
        assert!(dir.join(file).is_file(), "missing {file}");
    }

    let json = std::fs::read_to_string(dir.join("report.json")).unwrap();
    assert_eq!(import_json(&json).unwrap().ticker, "ACME");
}
