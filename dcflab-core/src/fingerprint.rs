//! Valuation fingerprinting: deterministic identification of inputs.
//!
//! - `SnapshotHash`: content hash of the fundamentals snapshot.
//! - `ConfigHash`: hash of the valuation constants.
//! - `ValuationFingerprint`: everything needed to tell whether two reports
//!   came from the same inputs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ValuationConfig;
use crate::domain::CompanyFundamentals;

/// BLAKE3 of the canonical JSON of a fundamentals snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHash(pub String);

impl SnapshotHash {
    pub fn of(company: &CompanyFundamentals) -> Self {
        Self(hash_json(company))
    }
}

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 of the canonical JSON of a `ValuationConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn of(config: &ValuationConfig) -> Self {
        Self(hash_json(config))
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one valuation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationFingerprint {
    pub ticker: String,
    pub snapshot_hash: SnapshotHash,
    pub config_hash: ConfigHash,
    pub required_return: f64,
    pub perpetual_growth_rate: f64,
}

impl ValuationFingerprint {
    pub fn new(
        company: &CompanyFundamentals,
        config: &ValuationConfig,
        required_return: f64,
        perpetual_growth_rate: f64,
    ) -> Self {
        Self {
            ticker: company.ticker.clone(),
            snapshot_hash: SnapshotHash::of(company),
            config_hash: ConfigHash::of(config),
            required_return,
            perpetual_growth_rate,
        }
    }

    /// Short id for directory names: ticker plus the first 12 hex digits of the combined hash.
    pub fn short_id(&self) -> String {
        let combined = format!(
            "{}:{}:{}:{}",
            self.snapshot_hash, self.config_hash, self.required_return, self.perpetual_growth_rate
        );
        let hex = blake3::hash(combined.as_bytes()).to_hex();
        format!("{}-{}", self.ticker, &hex[..12])
    }
}

// Struct fields serialize in declaration order, so the JSON is canonical.
// Serializing these plain data types cannot fail; the Debug form covers it anyway.
fn hash_json<T: Serialize + fmt::Debug>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_else(|_| format!("{value:?}").into_bytes());
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FinancialTimeSeries;
    use chrono::NaiveDate;

    fn company(last_fcf: f64) -> CompanyFundamentals {
        let latest = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        CompanyFundamentals {
            ticker: "ACME".into(),
            free_cash_flow: FinancialTimeSeries::from_recent_first(latest, &[last_fcf, 14.0])
                .unwrap(),
            ..CompanyFundamentals::default()
        }
    }

    #[test]
    fn snapshot_hash_is_deterministic() {
        assert_eq!(SnapshotHash::of(&company(18.0)), SnapshotHash::of(&company(18.0)));
        assert_eq!(SnapshotHash::of(&company(18.0)).0.len(), 64);
    }

    #[test]
    fn snapshot_hash_tracks_content() {
        assert_ne!(SnapshotHash::of(&company(18.0)), SnapshotHash::of(&company(18.5)));
    }

    #[test]
    fn config_hash_tracks_constants() {
        let a = ValuationConfig::default();
        let mut b = ValuationConfig::default();
        b.wacc.fallback_rate = 0.08;
        assert_eq!(ConfigHash::of(&a), ConfigHash::of(&ValuationConfig::default()));
        assert_ne!(ConfigHash::of(&a), ConfigHash::of(&b));
    }

    #[test]
    fn short_id_depends_on_rates() {
        let cfg = ValuationConfig::default();
        let a = ValuationFingerprint::new(&company(18.0), &cfg, 0.10, 0.025);
        let b = ValuationFingerprint::new(&company(18.0), &cfg, 0.09, 0.025);
        assert!(a.short_id().starts_with("ACME-"));
        assert_eq!(a.short_id().len(), "ACME-".len() + 12);
        assert_ne!(a.short_id(), b.short_id());
    }
}
