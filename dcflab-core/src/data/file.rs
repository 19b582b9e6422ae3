//! Snapshot file provider.
//!
//! Layout: `{data_dir}/{TICKER}.json` or `{data_dir}/{TICKER}.toml`, each a
//! serialized `CompanyFundamentals`. The risk-free rate is either fixed at
//! construction or read from `{data_dir}/market.toml`:
//!
//! ```toml
//! risk_free_rate = 0.042
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use super::provider::{DataError, DataProvider};
use super::TREASURY_SYMBOL;
use crate::domain::CompanyFundamentals;

const MARKET_FILE: &str = "market.toml";

#[derive(Debug, Deserialize)]
struct MarketSnapshot {
    risk_free_rate: Option<f64>,
}

/// Reads fundamentals snapshots from a directory.
#[derive(Debug, Clone)]
pub struct FileProvider {
    data_dir: PathBuf,
    risk_free_rate: Option<f64>,
}

impl FileProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            risk_free_rate: None,
        }
    }

    /// Use a fixed risk-free rate instead of `market.toml`.
    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = Some(rate);
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// First existing snapshot path for `ticker`, trying the name as given then uppercased.
    fn snapshot_path(&self, ticker: &str) -> Option<PathBuf> {
        let upper = ticker.to_ascii_uppercase();
        [ticker, upper.as_str()]
            .iter()
            .flat_map(|name| ["json", "toml"].map(|ext| self.data_dir.join(format!("{name}.{ext}"))))
            .find(|p| p.is_file())
    }
}

/// Parse a snapshot file, choosing the format by extension.
pub fn load_snapshot(path: &Path) -> Result<CompanyFundamentals, DataError> {
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |detail: String| DataError::Parse {
        path: path.to_path_buf(),
        detail,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text).map_err(|e| parse_err(e.to_string())),
        Some("toml") => toml::from_str(&text).map_err(|e| parse_err(e.to_string())),
        other => Err(parse_err(format!("unsupported snapshot format {other:?}"))),
    }
}

impl DataProvider for FileProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, DataError> {
        let path = self
            .snapshot_path(ticker)
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            })?;
        debug!(path = %path.display(), "loading fundamentals snapshot");

        let mut company = load_snapshot(&path)?;
        if company.ticker.is_empty() {
            company.ticker = ticker.to_ascii_uppercase();
        }
        Ok(company)
    }

    fn risk_free_rate(&self) -> Result<f64, DataError> {
        if let Some(rate) = self.risk_free_rate {
            return Ok(rate);
        }

        let path = self.data_dir.join(MARKET_FILE);
        let missing = || DataError::MissingLineItem {
            item: "risk_free_rate".into(),
            ticker: TREASURY_SYMBOL.into(),
        };
        if !path.is_file() {
            return Err(missing());
        }

        let text = fs::read_to_string(&path).map_err(|source| DataError::Io {
            path: path.clone(),
            source,
        })?;
        let market: MarketSnapshot = toml::from_str(&text).map_err(|e| DataError::Parse {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        market.risk_free_rate.ok_or_else(missing)
    }

    fn is_available(&self) -> bool {
        self.data_dir.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_snapshot_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let p = FileProvider::new(dir.path());
        assert!(p.is_available());
        assert!(matches!(
            p.fundamentals("ACME"),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn fixed_rate_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MARKET_FILE), "risk_free_rate = 0.05\n").unwrap();
        let p = FileProvider::new(dir.path()).with_risk_free_rate(0.03);
        assert_eq!(p.risk_free_rate().unwrap(), 0.03);
        assert_eq!(FileProvider::new(dir.path()).risk_free_rate().unwrap(), 0.05);
    }

    #[test]
    fn no_market_file_is_missing_line_item() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FileProvider::new(dir.path()).risk_free_rate(),
            Err(DataError::MissingLineItem { .. })
        ));
    }

    #[test]
    fn malformed_snapshot_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("BAD.json"), "{ not json").unwrap();
        let err = FileProvider::new(dir.path()).fundamentals("BAD").unwrap_err();
        assert!(matches!(err, DataError::Parse { .. }));
        assert!(err.to_string().contains("BAD.json"));
    }

    #[test]
    fn missing_directory_is_unavailable() {
        assert!(!FileProvider::new("/nonexistent/dcflab").is_available());
    }
}
