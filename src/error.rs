use crate::domain::account::AccountStatus;
use crate::domain::rule::RuleError;
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// A single problem found while validating a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    InvalidAmount,
    InvalidCurrency,
    InvalidAccount,
    SameAccount,
    FutureTimestamp,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValidationIssue::InvalidAmount => "invalid transaction amount",
            ValidationIssue::InvalidCurrency => "invalid currency",
            ValidationIssue::InvalidAccount => "invalid account",
            ValidationIssue::SameAccount => "cannot transfer to same account",
            ValidationIssue::FutureTimestamp => "transaction date cannot be in the future",
        };
        f.write_str(msg)
    }
}

/// Every violation found by one validation pass, in check order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn contains(&self, issue: &ValidationIssue) -> bool {
        self.0.contains(issue)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", joined.join(", "))
    }
}

/// Which ceiling a ledger operation ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Deposit,
    DailyWithdrawal,
    Daily,
    Monthly,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LimitKind::Deposit => "deposit",
            LimitKind::DailyWithdrawal => "daily withdrawal",
            LimitKind::Daily => "daily",
            LimitKind::Monthly => "monthly",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("duplicate transaction: {0}")]
    DuplicateTransaction(String),
    #[error("invalid transaction amount")]
    InvalidAmount,
    #[error("amount exceeds maximum limit for {currency}: {limit}")]
    AmountCeilingExceeded { currency: String, limit: Decimal },
    #[error("insufficient funds in account {0}")]
    InsufficientFunds(String),
    #[error("account not found: {0}")]
    AccountNotFound(String),
    #[error("account {id} is not active: {status}")]
    AccountInactive { id: String, status: AccountStatus },
    #[error("currency mismatch: {0} != {1}")]
    CurrencyMismatch(String, String),
    #[error("cannot transfer account {0} to itself")]
    SameAccount(String),
    #[error("{role} account is required for {operation}")]
    MissingAccount {
        role: &'static str,
        operation: &'static str,
    },
    #[error("{kind} limit exceeded: {attempted:.2}/{limit:.2}")]
    LimitExceeded {
        kind: LimitKind,
        attempted: Decimal,
        limit: Decimal,
    },
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("event sink closed")]
    EventSinkClosed,
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PaymentError {
    /// True for failures that happen before any side effect and can be retried
    /// once the input is corrected.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PaymentError::Validation(_)
                | PaymentError::InvalidAmount
                | PaymentError::AmountCeilingExceeded { .. }
                | PaymentError::InsufficientFunds(_)
                | PaymentError::AccountNotFound(_)
                | PaymentError::AccountInactive { .. }
                | PaymentError::CurrencyMismatch(..)
                | PaymentError::MissingAccount { .. }
                | PaymentError::SameAccount(_)
                | PaymentError::LimitExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
