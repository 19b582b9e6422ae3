//! DCF Lab Runner: valuation pipeline, batch valuation, reports, export.
//!
//! This crate builds on `dcflab-core` to provide:
//! - The single-ticker pipeline (provider → WACC → required return → DCF)
//! - Parallel batch valuation with per-ticker failures
//! - Schema-versioned reports and a plain-text summary
//! - JSON and CSV artifact export

pub mod batch;
pub mod export;
pub mod pipeline;
pub mod report;

pub use batch::{export_batch_csv, value_batch, BatchEntry, BatchResults, BatchRow};
pub use export::{export_json, export_series_csv, import_json, save_artifacts};
pub use pipeline::{
    value_ticker, RateSource, RunError, ValuationRequest, GROWTH_RANGE, REQUIRED_RETURN_RANGE,
};
pub use report::{render_text, Multiples, ValuationReport, Verdict, SCHEMA_VERSION};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_is_send_sync() {
        assert_send::<ValuationReport>();
        assert_sync::<ValuationReport>();
    }

    #[test]
    fn request_is_send_sync() {
        assert_send::<ValuationRequest>();
        assert_sync::<ValuationRequest>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }

    #[test]
    fn batch_entry_is_send() {
        assert_send::<BatchEntry>();
    }
}
