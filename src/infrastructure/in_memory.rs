use crate::domain::account::{Account, AccountStatus, Balance};
use crate::domain::period::Period;
use crate::domain::ports::{AccountStore, RuleStore, SharedClock, TransactionStore};
use crate::domain::rule::{Rule, RuleType};
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::{PaymentError, Result};
use crate::infrastructure::clock::SystemClock;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct AccountTables {
    accounts: HashMap<String, Account>,
    by_owner: HashMap<String, Vec<String>>,
}

/// A thread-safe in-memory store for accounts.
///
/// Uses `Arc<RwLock<..>>` so clones share state: concurrent reads, exclusive
/// writes. Ideal for tests and the CLI where persistence is not required.
#[derive(Clone)]
pub struct InMemoryAccountStore {
    inner: Arc<RwLock<AccountTables>>,
    clock: SharedClock,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryAccountStore {
    /// Creates a new, empty in-memory account store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store that stamps activity times from `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            inner: Arc::default(),
            clock,
        }
    }
}

fn missing(kind: &str, id: &str) -> PaymentError {
    PaymentError::NotFound(format!("{kind} {id}"))
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn save(&self, account: Account) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(PaymentError::DuplicateEntry(format!("account {}", account.id)));
        }
        tables
            .by_owner
            .entry(account.owner_id.clone())
            .or_default()
            .push(account.id.clone());
        tables.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Account>> {
        let tables = self.inner.read().await;
        Ok(tables.accounts.get(id).cloned())
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<Account>> {
        let tables = self.inner.read().await;
        let ids = tables.by_owner.get(owner_id).map(Vec::as_slice).unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| tables.accounts.get(id).cloned())
            .collect())
    }

    async fn update(&self, account: Account) -> Result<()> {
        let mut tables = self.inner.write().await;
        let Some(slot) = tables.accounts.get_mut(&account.id) else {
            return Err(missing("account", &account.id));
        };
        *slot = account;
        Ok(())
    }

    async fn update_balance(&self, id: &str, delta: Decimal) -> Result<()> {
        let mut tables = self.inner.write().await;
        let account = tables
            .accounts
            .get_mut(id)
            .ok_or_else(|| missing("account", id))?;
        account.balance += Balance::new(delta);
        account.last_activity_at = self.clock.now();
        Ok(())
    }

    async fn update_status(&self, id: &str, status: AccountStatus) -> Result<()> {
        let mut tables = self.inner.write().await;
        let account = tables
            .accounts
            .get_mut(id)
            .ok_or_else(|| missing("account", id))?;
        account.status = status;
        account.last_activity_at = self.clock.now();
        Ok(())
    }

    async fn get_all_active(&self) -> Result<Vec<Account>> {
        let tables = self.inner.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect())
    }

    async fn get_by_risk_category(&self, category: &str) -> Result<Vec<Account>> {
        let tables = self.inner.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|a| a.risk_category == category)
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        let tables = self.inner.read().await;
        let mut accounts: Vec<Account> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }
}

#[derive(Default)]
struct TransactionTables {
    transactions: HashMap<String, Transaction>,
    by_account: HashMap<String, Vec<String>>,
}

impl TransactionTables {
    fn completed_volume(&self, account_id: &str, period: Period) -> Decimal {
        self.transactions
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Completed
                    && tx.touches(account_id)
                    && period.contains(tx.created_at)
            })
            .map(|tx| tx.amount)
            .sum()
    }
}

/// A thread-safe in-memory store for transactions.
///
/// Keeps a per-account index so account history lookups do not scan every
/// stored transaction.
#[derive(Clone)]
pub struct InMemoryTransactionStore {
    inner: Arc<RwLock<TransactionTables>>,
    clock: SharedClock,
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store that stamps `updated_at` from `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            inner: Arc::default(),
            clock,
        }
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn save(&self, mut tx: Transaction) -> Result<()> {
        let mut tables = self.inner.write().await;
        if tables.transactions.contains_key(tx.id()) {
            return Err(PaymentError::DuplicateEntry(format!("transaction {}", tx.id())));
        }
        tx.updated_at = self.clock.now();
        let id = tx.id().to_string();
        for account in [&tx.from_account, &tx.to_account].into_iter().flatten() {
            tables
                .by_account
                .entry(account.clone())
                .or_default()
                .push(id.clone());
        }
        tables.transactions.insert(id, tx);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Transaction>> {
        let tables = self.inner.read().await;
        Ok(tables.transactions.get(id).cloned())
    }

    async fn get_by_account(
        &self,
        account_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let tables = self.inner.read().await;
        let mut history: Vec<&Transaction> = tables
            .by_account
            .get(account_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| tables.transactions.get(id))
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_by_status(&self, status: TransactionStatus) -> Result<Vec<Transaction>> {
        let tables = self.inner.read().await;
        let mut result: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|tx| tx.status == status)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn get_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        let tables = self.inner.read().await;
        let mut result: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|tx| tx.created_at >= from && tx.created_at <= to)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<()> {
        let mut tables = self.inner.write().await;
        let tx = tables
            .transactions
            .get_mut(id)
            .ok_or_else(|| missing("transaction", id))?;
        tx.status = status;
        tx.updated_at = self.clock.now();
        Ok(())
    }

    async fn daily_volume(&self, account_id: &str, date: NaiveDate) -> Result<Decimal> {
        let tables = self.inner.read().await;
        Ok(tables.completed_volume(account_id, Period::day(date)))
    }

    async fn monthly_volume(&self, account_id: &str, year: i32, month: u32) -> Result<Decimal> {
        let period = Period::month(year, month)
            .ok_or_else(|| PaymentError::Storage(format!("invalid month {year}-{month}")))?;
        let tables = self.inner.read().await;
        Ok(tables.completed_volume(account_id, period))
    }
}

/// A thread-safe in-memory store for rules.
#[derive(Default, Clone)]
pub struct InMemoryRuleStore {
    rules: Arc<RwLock<HashMap<String, Rule>>>,
}

impl InMemoryRuleStore {
    /// Creates a new, empty in-memory rule store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn by_priority_desc(rules: &mut [Rule]) {
    rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn save(&self, mut rule: Rule) -> Result<()> {
        let mut rules = self.rules.write().await;
        if rules.contains_key(&rule.id) {
            return Err(PaymentError::DuplicateEntry(format!("rule {}", rule.id)));
        }
        rule.version = 1;
        rules.insert(rule.id.clone(), rule);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Rule>> {
        let rules = self.rules.read().await;
        Ok(rules.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut result: Vec<Rule> = rules.values().cloned().collect();
        by_priority_desc(&mut result);
        Ok(result)
    }

    async fn get_by_type(&self, rule_type: RuleType) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut result: Vec<Rule> = rules
            .values()
            .filter(|r| r.r#type == rule_type)
            .cloned()
            .collect();
        by_priority_desc(&mut result);
        Ok(result)
    }

    async fn get_active(&self) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut result: Vec<Rule> = rules.values().filter(|r| r.is_active).cloned().collect();
        by_priority_desc(&mut result);
        Ok(result)
    }

    async fn update(&self, mut rule: Rule) -> Result<()> {
        let mut rules = self.rules.write().await;
        let existing = rules
            .get_mut(&rule.id)
            .ok_or_else(|| missing("rule", &rule.id))?;
        rule.version = existing.version + 1;
        *existing = rule;
        Ok(())
    }

    async fn deactivate(&self, id: &str) -> Result<()> {
        let mut rules = self.rules.write().await;
        let rule = rules.get_mut(id).ok_or_else(|| missing("rule", id))?;
        rule.is_active = false;
        Ok(())
    }

    async fn get_by_priority_range(&self, min: i32, max: i32) -> Result<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut result: Vec<Rule> = rules
            .values()
            .filter(|r| r.is_active && (min..=max).contains(&r.priority))
            .cloned()
            .collect();
        by_priority_desc(&mut result);
        Ok(result)
    }
}
