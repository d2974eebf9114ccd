use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Suspicious,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Suspicious => "suspicious",
        };
        f.write_str(s)
    }
}

/// Fraud risk on a 0..=100 scale. Construction always clamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(100);

    pub fn new(raw: i64) -> Self {
        Self(raw.clamp(0, 100) as u8)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Returns a new score shifted by `delta`, clamped back into range.
    pub fn adjusted(self, delta: i64) -> Self {
        Self::new(i64::from(self.0) + delta)
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A financial transaction moving through the processing pipeline.
///
/// The identifier is fixed at construction and only readable afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    id: String,
    pub r#type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub risk_score: RiskScore,
    #[serde(default)]
    pub fraud_flags: Vec<String>,
}

impl Transaction {
    /// Creates a pending transaction with a freshly generated identifier.
    pub fn new(r#type: TransactionType, amount: Decimal, currency: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().simple().to_string(), r#type, amount, currency)
    }

    pub fn with_id(
        id: impl Into<String>,
        r#type: TransactionType,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            r#type,
            amount,
            currency: currency.into(),
            from_account: None,
            to_account: None,
            description: String::new(),
            status: TransactionStatus::Pending,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
            risk_score: RiskScore::MIN,
            fraud_flags: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sets source and destination; empty strings are treated as absent.
    pub fn with_accounts(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_account = non_empty(from.into());
        self.to_account = non_empty(to.into());
        self
    }

    pub fn with_source(mut self, account: impl Into<String>) -> Self {
        self.from_account = non_empty(account.into());
        self
    }

    pub fn with_destination(mut self, account: impl Into<String>) -> Self {
        self.to_account = non_empty(account.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_metadata(key, value);
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// True when `account_id` is the source or destination.
    pub fn touches(&self, account_id: &str) -> bool {
        self.from_account.as_deref() == Some(account_id)
            || self.to_account.as_deref() == Some(account_id)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

/// Event emitted to the notification queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionEvent {
    pub transaction_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    pub const SUSPICIOUS: &'static str = "transaction_suspicious";

    pub fn suspicious(tx: &Transaction, at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: tx.id().to_string(),
            event_type: Self::SUSPICIOUS.to_string(),
            payload: serde_json::json!({
                "risk_score": tx.risk_score.value(),
                "flags": tx.fraud_flags,
            }),
            timestamp: at,
        }
    }
}
