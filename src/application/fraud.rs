use crate::config::FraudConfig;
use crate::domain::transaction::{RiskScore, Transaction};
use chrono::{DateTime, Timelike, Utc};

type Detect = Box<dyn Fn(&Transaction, DateTime<Utc>) -> bool + Send + Sync>;

/// One weighted signal in the detector registry.
pub struct FraudPattern {
    pub name: String,
    pub description: String,
    pub weight: u32,
    /// Flag appended to the transaction when the pattern fires.
    pub flag: String,
    detect: Detect,
}

impl FraudPattern {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        weight: u32,
        flag: impl Into<String>,
        detect: impl Fn(&Transaction, DateTime<Utc>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            weight,
            flag: flag.into(),
            detect: Box::new(detect),
        }
    }

    pub fn detects(&self, tx: &Transaction, now: DateTime<Utc>) -> bool {
        (self.detect)(tx, now)
    }
}

impl std::fmt::Debug for FraudPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FraudPattern")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("flag", &self.flag)
            .finish_non_exhaustive()
    }
}

/// Weighted pattern scorer.
///
/// Holds no per-transaction state: the score depends only on the transaction
/// and the instant it is analyzed at.
#[derive(Debug)]
pub struct FraudDetector {
    patterns: Vec<FraudPattern>,
    surcharge: u32,
    late_night_start: u32,
    late_night_end: u32,
}

impl FraudDetector {
    /// Builds the reference registry: large_amount (30), frequent_transactions (25),
    /// geographical_anomaly (35), velocity_check (40).
    pub fn new(config: &FraudConfig) -> Self {
        let large = config.large_amount_threshold;
        let frequent = config.frequent_amount_threshold;
        let before_hour = config.frequent_before_hour;
        let location = config.flagged_location.clone();

        let patterns = vec![
            FraudPattern::new(
                "large_amount",
                "Transaction amount exceeds threshold",
                30,
                "large_amount",
                move |tx, _| tx.amount > large,
            ),
            FraudPattern::new(
                "frequent_transactions",
                "Too many transactions in short time",
                25,
                "frequent_transactions",
                move |tx, now| tx.amount > frequent && now.hour() < before_hour,
            ),
            FraudPattern::new(
                "geographical_anomaly",
                "Transaction from unusual location",
                35,
                "geographical_anomaly",
                move |tx, _| tx.metadata.get("location") == Some(&location),
            ),
            FraudPattern::new(
                "velocity_check",
                "Unusual transaction velocity",
                40,
                "velocity_anomaly",
                |tx, _| tx.metadata.get("velocity").is_some_and(|v| v == "high"),
            ),
        ];

        Self::with_patterns(config, patterns)
    }

    /// A detector with a caller-supplied registry and the configured surcharge.
    pub fn with_patterns(config: &FraudConfig, patterns: Vec<FraudPattern>) -> Self {
        Self {
            patterns,
            surcharge: config.late_night_surcharge,
            late_night_start: config.late_night_start_hour,
            late_night_end: config.late_night_end_hour,
        }
    }

    /// Appends a pattern after the existing ones.
    pub fn register(&mut self, pattern: FraudPattern) {
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[FraudPattern] {
        &self.patterns
    }

    /// Sums the weights of triggered patterns, adds the late-night surcharge to a
    /// nonzero sum, and clamps to 0..=100. Flags follow registry order.
    pub fn analyze(&self, tx: &Transaction, now: DateTime<Utc>) -> (RiskScore, Vec<String>) {
        let mut score: i64 = 0;
        let mut flags = Vec::new();

        for pattern in &self.patterns {
            if pattern.detects(tx, now) {
                score += i64::from(pattern.weight);
                flags.push(pattern.flag.clone());
            }
        }

        if score > 0 && self.is_late_night(now.hour()) {
            score += i64::from(self.surcharge);
        }

        (RiskScore::new(score), flags)
    }

    fn is_late_night(&self, hour: u32) -> bool {
        if self.late_night_start <= self.late_night_end {
            (self.late_night_start..=self.late_night_end).contains(&hour)
        } else {
            hour >= self.late_night_start || hour <= self.late_night_end
        }
    }
}
