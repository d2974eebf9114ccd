use crate::domain::account::{Account, AccountStatus};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of an accounts file.
///
/// Only `id`, `owner` and `currency` are required; the rest default to a zero
/// balance, active status and no limits.
#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: String,
    owner: String,
    #[serde(default)]
    balance: Option<Decimal>,
    currency: String,
    #[serde(default)]
    status: Option<AccountStatus>,
    #[serde(default)]
    daily_limit: Option<Decimal>,
    #[serde(default)]
    monthly_limit: Option<Decimal>,
    #[serde(default)]
    risk_category: Option<String>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        Account::new(record.id, record.owner, record.currency)
            .with_balance(record.balance.unwrap_or_default())
            .with_status(record.status.unwrap_or_default())
            .with_limits(
                record.daily_limit.unwrap_or_default(),
                record.monthly_limit.unwrap_or_default(),
            )
            .with_risk_category(record.risk_category.unwrap_or_default())
    }
}

/// Reads accounts from a CSV source with a header row.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes each row into an `Account`.
    pub fn accounts(self) -> impl Iterator<Item = Result<Account>> {
        self.reader
            .into_deserialize::<AccountRecord>()
            .map(|result| result.map(Account::from).map_err(PaymentError::from))
    }
}
