//! Processing configuration.
//!
//! Every threshold has a default, so an empty or partial TOML file is valid.

use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub validator: ValidatorConfig,
    pub fraud: FraudConfig,
    pub risk: RiskConfig,
    pub ledger: LedgerConfig,
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// How far in the future a creation timestamp may be.
    pub max_future_skew_secs: i64,
    /// Per-currency ceilings enforced by `validate_amount`.
    pub currency_ceilings: HashMap<String, Decimal>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FraudConfig {
    pub large_amount_threshold: Decimal,
    pub frequent_amount_threshold: Decimal,
    pub frequent_before_hour: u32,
    pub flagged_location: String,
    pub late_night_surcharge: u32,
    pub late_night_start_hour: u32,
    pub late_night_end_hour: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RiskConfig {
    /// Scores above this are marked suspicious.
    pub suspicious_above: u8,
    /// Scores above this (and not suspicious) wait for review.
    pub review_above: u8,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    pub max_deposit: Decimal,
    pub daily_withdrawal_limit: Decimal,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EventConfig {
    pub queue_capacity: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_future_skew_secs: 300,
            currency_ceilings: HashMap::from([
                ("USD".to_string(), Decimal::new(1_000_000, 0)),
                ("EUR".to_string(), Decimal::new(900_000, 0)),
                ("GBP".to_string(), Decimal::new(800_000, 0)),
            ]),
        }
    }
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            large_amount_threshold: Decimal::new(10_000, 0),
            frequent_amount_threshold: Decimal::new(5_000, 0),
            frequent_before_hour: 6,
            flagged_location: "high_risk_country".into(),
            late_night_surcharge: 15,
            late_night_start_hour: 23,
            late_night_end_hour: 5,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            suspicious_above: 80,
            review_above: 50,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_deposit: Decimal::new(50_000, 0),
            daily_withdrawal_limit: Decimal::new(5_000, 0),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
        }
    }
}

impl Config {
    /// Loads a TOML file; missing keys fall back to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| PaymentError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.risk.review_above > self.risk.suspicious_above {
            return Err(PaymentError::Config(format!(
                "risk.review_above ({}) must not exceed risk.suspicious_above ({})",
                self.risk.review_above, self.risk.suspicious_above
            )));
        }
        if self.fraud.late_night_start_hour > 23 || self.fraud.late_night_end_hour > 23 {
            return Err(PaymentError::Config(
                "late-night hours must be within 0..=23".into(),
            ));
        }
        Ok(())
    }
}
