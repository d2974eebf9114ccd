use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Represents a monetary balance held by an account.
///
/// This is a wrapper around `rust_decimal::Decimal` so balances cannot be
/// confused with raw transaction amounts in ledger code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub Decimal);

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn covers(&self, amount: Decimal) -> bool {
        self.0 >= amount
    }
}

impl From<Decimal> for Balance {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A customer account whose balance the ledger mutates.
///
/// The currency is fixed at creation. A zero `daily_limit` or `monthly_limit`
/// means the account defines no aggregate-volume limit for that window.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: String,
    pub owner_id: String,
    pub balance: Balance,
    currency: String,
    pub status: AccountStatus,
    #[serde(default)]
    pub daily_limit: Decimal,
    #[serde(default)]
    pub monthly_limit: Decimal,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub risk_category: String,
}

impl Account {
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            balance: Balance::ZERO,
            currency: currency.into(),
            status: AccountStatus::Active,
            daily_limit: Decimal::ZERO,
            monthly_limit: Decimal::ZERO,
            created_at: now,
            last_activity_at: now,
            risk_category: String::new(),
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = Balance::new(balance);
        self
    }

    pub fn with_limits(mut self, daily: Decimal, monthly: Decimal) -> Self {
        self.daily_limit = daily;
        self.monthly_limit = monthly;
        self
    }

    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_risk_category(mut self, category: impl Into<String>) -> Self {
        self.risk_category = category.into();
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Credits the balance and stamps the activity time.
    pub fn credit(&mut self, amount: Decimal, at: DateTime<Utc>) {
        self.balance += Balance::new(amount);
        self.last_activity_at = at;
    }

    /// Debits the balance and stamps the activity time.
    ///
    /// Callers check `balance.covers(amount)` first; the ledger never commits a
    /// negative balance.
    pub fn debit(&mut self, amount: Decimal, at: DateTime<Utc>) {
        self.balance -= Balance::new(amount);
        self.last_activity_at = at;
    }
}
