//! Fundamentals sources and series alignment

pub mod align;
pub mod circuit_breaker;
pub mod file;
pub mod provider;
pub mod yahoo;

pub use align::{align_series, AlignedSeries};
pub use circuit_breaker::CircuitBreaker;
pub use file::{load_snapshot, FileProvider};
pub use provider::{DataError, DataProvider, StaticProvider};
pub use yahoo::YahooProvider;

/// Yahoo symbol of the 10-year treasury yield index.
pub const TREASURY_SYMBOL: &str = "^TNX";
