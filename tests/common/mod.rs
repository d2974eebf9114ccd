#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use txguard::application::fraud::{FraudDetector, FraudPattern};
use txguard::application::processor::TransactionProcessor;
use txguard::config::{Config, FraudConfig};
use txguard::domain::account::{Account, AccountStatus, Balance};
use txguard::domain::ports::{AccountStore, RuleStore};
use txguard::domain::rule::Rule;
use txguard::domain::transaction::{Transaction, TransactionEvent, TransactionType};
use txguard::error::{PaymentError, Result};
use txguard::infrastructure::clock::FixedClock;
use txguard::infrastructure::events::ChannelEventSink;
use txguard::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryRuleStore, InMemoryTransactionStore,
};

/// Midday: outside the late-night surcharge window.
pub fn noon() -> DateTime<Utc> {
    at_hour(12)
}

pub fn at_hour(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, hour, 0, 0).unwrap()
}

/// Everything a pipeline test needs, wired to in-memory stores.
pub struct Harness {
    pub processor: Arc<TransactionProcessor>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub transactions: Arc<InMemoryTransactionStore>,
    pub rules: Arc<InMemoryRuleStore>,
    pub clock: Arc<FixedClock>,
    pub events: mpsc::Receiver<TransactionEvent>,
}

pub struct HarnessBuilder {
    accounts: Vec<Account>,
    rules: Vec<Rule>,
    now: DateTime<Utc>,
    config: Config,
    fixed_score: Option<u32>,
}

impl HarnessBuilder {
    pub fn account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Replaces the detector registry with one pattern that always fires
    /// with this weight.
    pub fn fixed_score(mut self, score: u32) -> Self {
        self.fixed_score = Some(score);
        self
    }

    pub async fn build(self) -> Harness {
        let clock = Arc::new(FixedClock::new(self.now));
        let accounts = Arc::new(InMemoryAccountStore::with_clock(clock.clone()));
        for account in self.accounts {
            accounts.save(account).await.unwrap();
        }
        let rules = Arc::new(InMemoryRuleStore::new());
        for rule in self.rules {
            rules.save(rule).await.unwrap();
        }
        let transactions = Arc::new(InMemoryTransactionStore::with_clock(clock.clone()));
        let (sink, events) = ChannelEventSink::bounded(self.config.events.queue_capacity);

        let mut processor = TransactionProcessor::with_clock(
            transactions.clone(),
            accounts.clone(),
            rules.clone(),
            Arc::new(sink),
            &self.config,
            clock.clone(),
        );
        if let Some(score) = self.fixed_score {
            processor = processor.with_fraud_detector(fixed_detector(score));
        }

        Harness {
            processor: Arc::new(processor),
            accounts,
            transactions,
            rules,
            clock,
            events,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder {
        accounts: Vec::new(),
        rules: Vec::new(),
        now: noon(),
        config: Config::default(),
        fixed_score: None,
    }
}

pub fn fixed_detector(score: u32) -> FraudDetector {
    FraudDetector::with_patterns(
        &FraudConfig::default(),
        vec![FraudPattern::new(
            "fixed",
            "Always fires",
            score,
            "fixed",
            |_, _| true,
        )],
    )
}

impl Harness {
    pub async fn balance(&self, id: &str) -> Balance {
        self.accounts.get(id).await.unwrap().unwrap().balance
    }
}

pub fn usd_account(id: &str, balance: Decimal) -> Account {
    Account::new(id, format!("owner-{id}"), "USD").with_balance(balance)
}

pub fn deposit(id: &str, to: &str, amount: Decimal) -> Transaction {
    Transaction::with_id(id, TransactionType::Deposit, amount, "USD")
        .with_destination(to)
        .with_created_at(at_hour(11))
}

pub fn withdrawal(id: &str, from: &str, amount: Decimal) -> Transaction {
    Transaction::with_id(id, TransactionType::Withdrawal, amount, "USD")
        .with_source(from)
        .with_created_at(at_hour(11))
}

pub fn transfer(id: &str, from: &str, to: &str, amount: Decimal) -> Transaction {
    Transaction::with_id(id, TransactionType::Transfer, amount, "USD")
        .with_accounts(from, to)
        .with_created_at(at_hour(11))
}

/// Account store whose `update` fails for chosen account ids.
pub struct RejectingAccountStore {
    inner: InMemoryAccountStore,
    reject: parking_lot::Mutex<HashSet<String>>,
}

impl RejectingAccountStore {
    pub fn new(inner: InMemoryAccountStore) -> Self {
        Self {
            inner,
            reject: parking_lot::Mutex::new(HashSet::new()),
        }
    }

    pub fn reject_updates_to(&self, id: &str) {
        self.reject.lock().insert(id.to_string());
    }
}

#[async_trait]
impl AccountStore for RejectingAccountStore {
    async fn save(&self, account: Account) -> Result<()> {
        self.inner.save(account).await
    }

    async fn get(&self, id: &str) -> Result<Option<Account>> {
        self.inner.get(id).await
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<Account>> {
        self.inner.get_by_owner(owner_id).await
    }

    async fn update(&self, account: Account) -> Result<()> {
        if self.reject.lock().contains(&account.id) {
            return Err(PaymentError::Storage(format!("update rejected for {}", account.id)));
        }
        self.inner.update(account).await
    }

    async fn update_balance(&self, id: &str, delta: Decimal) -> Result<()> {
        self.inner.update_balance(id, delta).await
    }

    async fn update_status(&self, id: &str, status: AccountStatus) -> Result<()> {
        self.inner.update_status(id, status).await
    }

    async fn get_all_active(&self) -> Result<Vec<Account>> {
        self.inner.get_all_active().await
    }

    async fn get_by_risk_category(&self, category: &str) -> Result<Vec<Account>> {
        self.inner.get_by_risk_category(category).await
    }

    async fn get_all(&self) -> Result<Vec<Account>> {
        self.inner.get_all().await
    }
}

/// Writes `rows` small deposits into `acc-1`, one per row.
pub fn generate_deposits_csv(path: &Path, rows: usize) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["id", "type", "amount", "currency", "from", "to"])?;
    for i in 1..=rows {
        let id = format!("tx-{i}");
        wtr.write_record([id.as_str(), "deposit", "1.0", "USD", "", "acc-1"])?;
    }

    wtr.flush()?;
    Ok(())
}
