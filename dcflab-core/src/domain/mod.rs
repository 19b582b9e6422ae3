//! Domain types for DCF Lab

pub mod fundamentals;
pub mod rate;
pub mod series;

pub use fundamentals::{required, BalanceSheet, CompanyFundamentals, IncomeStatement, MarketQuote};
pub use rate::DiscountRate;
pub use series::{years_after, years_before, FinancialTimeSeries, Observation, Period};

/// Ticker symbol type alias
pub type Ticker = String;
