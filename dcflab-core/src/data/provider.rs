//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over fundamentals sources (Yahoo Finance,
//! snapshot files, in-memory fixtures) so the valuation pipeline can swap
//! implementations and mock them in tests.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::CompanyFundamentals;

/// Structured error types for data operations.
///
/// Displayable as-is in CLI output. Converts into
/// `ValuationError::DataUnavailable` at the core boundary.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("{ticker}: line item '{item}' not reported")]
    MissingLineItem { item: String, ticker: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("data error: {0}")]
    Other(String),
}

/// Source of company fundamentals and the market risk-free rate.
///
/// Implementations handle the specifics of one source. Retry and timeout
/// policy belongs to the implementation, never to the caller.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Reported fundamentals for `ticker`.
    fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, DataError>;

    /// 10-year treasury yield as a fraction (0.042 for 4.2%).
    fn risk_free_rate(&self) -> Result<f64, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// In-memory provider for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    companies: HashMap<String, CompanyFundamentals>,
    risk_free_rate: Option<f64>,
}

impl StaticProvider {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            companies: HashMap::new(),
            risk_free_rate: Some(risk_free_rate),
        }
    }

    /// Provider with no risk-free rate; `risk_free_rate()` fails.
    pub fn without_risk_free_rate() -> Self {
        Self::default()
    }

    pub fn with_company(mut self, company: CompanyFundamentals) -> Self {
        self.insert(company);
        self
    }

    pub fn insert(&mut self, company: CompanyFundamentals) {
        self.companies
            .insert(company.ticker.to_ascii_uppercase(), company);
    }
}

impl DataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fundamentals(&self, ticker: &str) -> Result<CompanyFundamentals, DataError> {
        self.companies
            .get(&ticker.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            })
    }

    fn risk_free_rate(&self) -> Result<f64, DataError> {
        self.risk_free_rate.ok_or_else(|| DataError::MissingLineItem {
            item: "risk_free_rate".into(),
            ticker: super::TREASURY_SYMBOL.into(),
        })
    }

    fn is_available(&self) -> bool {
        true
    }
}
