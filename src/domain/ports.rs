use super::account::{Account, AccountStatus};
use super::rule::{Rule, RuleType};
use super::transaction::{Transaction, TransactionEvent, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Persistence for transactions.
///
/// Implementations provide their own read/write locking but no atomicity
/// across entities.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Fails with `DuplicateEntry` if the identifier is already stored.
    async fn save(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Transaction>>;
    /// Transactions touching `account_id`, newest first.
    async fn get_by_account(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;
    async fn get_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>>;
    /// Transactions created within `[from, to]`, oldest first.
    async fn get_by_period(&self, from: DateTime<Utc>, to: DateTime<Utc>)
    -> Result<Vec<Transaction>>;
    async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<()>;
    /// Sum of completed amounts touching `account_id` on `date`.
    async fn daily_volume(&self, account_id: &str, date: NaiveDate) -> Result<Decimal>;
    /// Sum of completed amounts touching `account_id` in the calendar month.
    async fn monthly_volume(&self, account_id: &str, year: i32, month: u32) -> Result<Decimal>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fails with `DuplicateEntry` if the identifier is already stored.
    async fn save(&self, account: Account) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Account>>;
    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<Account>>;
    /// Replaces a stored account; fails with `NotFound` if absent.
    async fn update(&self, account: Account) -> Result<()>;
    async fn update_balance(&self, id: &str, delta: Decimal) -> Result<()>;
    async fn update_status(&self, id: &str, status: AccountStatus) -> Result<()>;
    async fn get_all_active(&self) -> Result<Vec<Account>>;
    async fn get_by_risk_category(&self, category: &str) -> Result<Vec<Account>>;
    async fn get_all(&self) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Stores a new rule with version 1.
    async fn save(&self, rule: Rule) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Rule>>;
    async fn get_all(&self) -> Result<Vec<Rule>>;
    async fn get_by_type(&self, rule_type: RuleType) -> Result<Vec<Rule>>;
    /// Active rules, highest priority first.
    async fn get_active(&self) -> Result<Vec<Rule>>;
    /// Replaces a stored rule and bumps its version.
    async fn update(&self, rule: Rule) -> Result<()>;
    async fn deactivate(&self, id: &str) -> Result<()>;
    /// Active rules with `min <= priority <= max`.
    async fn get_by_priority_range(&self, min: i32, max: i32) -> Result<Vec<Rule>>;
}

/// Outgoing queue of transaction events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Waits for queue space; never drops an event.
    async fn publish(&self, event: TransactionEvent) -> Result<()>;
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub type SharedTransactionStore = Arc<dyn TransactionStore>;
pub type SharedAccountStore = Arc<dyn AccountStore>;
pub type SharedRuleStore = Arc<dyn RuleStore>;
pub type SharedEventSink = Arc<dyn EventSink>;
pub type SharedClock = Arc<dyn Clock>;
