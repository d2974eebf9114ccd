use crate::config::LedgerConfig;
use crate::domain::account::Account;
use crate::domain::period::Period;
use crate::domain::ports::{SharedAccountStore, SharedClock, SharedTransactionStore};
use crate::domain::transaction::{Transaction, TransactionStatus, TransactionType};
use crate::error::{LimitKind, PaymentError, Result};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

/// Balance mutation for deposits, withdrawals and transfers.
///
/// Every operation runs inside one process-wide critical section, so at most one
/// balance mutation is in flight at any instant. Operations are not
/// cancellable once the section is entered.
pub struct Ledger {
    accounts: SharedAccountStore,
    transactions: SharedTransactionStore,
    clock: SharedClock,
    config: LedgerConfig,
    lock: Mutex<()>,
}

impl Ledger {
    pub fn new(
        accounts: SharedAccountStore,
        transactions: SharedTransactionStore,
        clock: SharedClock,
        config: LedgerConfig,
    ) -> Self {
        Self {
            accounts,
            transactions,
            clock,
            config,
            lock: Mutex::new(()),
        }
    }

    /// Runs the operation matching the transaction type.
    pub async fn apply(&self, tx: &Transaction) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.dispatch(tx).await
    }

    /// Applies `tx`, marks it completed and saves it before leaving the
    /// critical section, so the next operation sees it in the period totals.
    ///
    /// On a ledger failure `tx` is left untouched and nothing is saved.
    pub async fn settle(&self, tx: &mut Transaction) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.dispatch(tx).await?;
        tx.status = TransactionStatus::Completed;
        self.transactions.save(tx.clone()).await
    }

    async fn dispatch(&self, tx: &Transaction) -> Result<()> {
        match tx.r#type {
            TransactionType::Deposit => self.deposit(tx).await,
            TransactionType::Withdrawal => self.withdraw(tx).await,
            TransactionType::Transfer => self.transfer(tx).await,
        }
    }

    async fn deposit(&self, tx: &Transaction) -> Result<()> {
        tracing::info!(
            transaction_id = %tx.id(),
            to_account = ?tx.to_account,
            amount = %tx.amount,
            "Processing deposit"
        );
        let to_id = required(&tx.to_account, "destination", "deposit")?;
        let mut to = self.active_account(to_id).await?;

        if tx.amount > self.config.max_deposit {
            return Err(PaymentError::LimitExceeded {
                kind: LimitKind::Deposit,
                attempted: tx.amount,
                limit: self.config.max_deposit,
            });
        }

        to.credit(tx.amount, self.clock.now());
        self.accounts.update(to).await?;

        tracing::info!(transaction_id = %tx.id(), "Deposit completed successfully");
        Ok(())
    }

    async fn withdraw(&self, tx: &Transaction) -> Result<()> {
        tracing::info!(
            transaction_id = %tx.id(),
            from_account = ?tx.from_account,
            amount = %tx.amount,
            "Processing withdrawal"
        );
        let from_id = required(&tx.from_account, "source", "withdrawal")?;
        let mut from = self.active_account(from_id).await?;

        if !from.balance.covers(tx.amount) {
            return Err(PaymentError::InsufficientFunds(from.id));
        }

        let now = self.clock.now();
        let withdrawn = self.withdrawn_today(&from.id, now).await?;
        let attempted = withdrawn + tx.amount;
        if attempted > self.config.daily_withdrawal_limit {
            return Err(PaymentError::LimitExceeded {
                kind: LimitKind::DailyWithdrawal,
                attempted,
                limit: self.config.daily_withdrawal_limit,
            });
        }

        from.debit(tx.amount, now);
        self.accounts.update(from).await?;

        tracing::info!(transaction_id = %tx.id(), "Withdrawal completed successfully");
        Ok(())
    }

    async fn transfer(&self, tx: &Transaction) -> Result<()> {
        tracing::info!(
            transaction_id = %tx.id(),
            from_account = ?tx.from_account,
            to_account = ?tx.to_account,
            amount = %tx.amount,
            "Processing transfer"
        );
        let from_id = required(&tx.from_account, "source", "transfer")?;
        let to_id = required(&tx.to_account, "destination", "transfer")?;
        if from_id == to_id {
            return Err(PaymentError::SameAccount(from_id.to_string()));
        }

        let mut from = self.existing_account(from_id).await?;
        let mut to = self.existing_account(to_id).await?;

        if from.currency() != to.currency() {
            return Err(PaymentError::CurrencyMismatch(
                from.currency().to_string(),
                to.currency().to_string(),
            ));
        }
        ensure_active(&from)?;
        ensure_active(&to)?;

        if !from.balance.covers(tx.amount) {
            return Err(PaymentError::InsufficientFunds(from.id));
        }

        let now = self.clock.now();
        self.check_volume_limits(&from, tx.amount, now).await?;

        from.debit(tx.amount, now);
        to.credit(tx.amount, now);

        self.accounts.update(from.clone()).await?;
        if let Err(e) = self.accounts.update(to).await {
            tracing::warn!(
                transaction_id = %tx.id(),
                from_account = %from.id,
                error = %e,
                "Destination update failed, re-crediting source"
            );
            from.credit(tx.amount, now);
            if let Err(comp) = self.accounts.update(from).await {
                tracing::error!(
                    transaction_id = %tx.id(),
                    error = %comp,
                    "Compensation failed, ledger needs reconciliation"
                );
            }
            return Err(e);
        }

        tracing::info!(transaction_id = %tx.id(), "Transfer completed successfully");
        Ok(())
    }

    async fn check_volume_limits(
        &self,
        account: &Account,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let daily = self
            .transactions
            .daily_volume(&account.id, now.date_naive())
            .await?;
        if account.daily_limit > Decimal::ZERO && daily + amount > account.daily_limit {
            return Err(PaymentError::LimitExceeded {
                kind: LimitKind::Daily,
                attempted: daily + amount,
                limit: account.daily_limit,
            });
        }

        let monthly = self
            .transactions
            .monthly_volume(&account.id, now.year(), now.month())
            .await?;
        if account.monthly_limit > Decimal::ZERO && monthly + amount > account.monthly_limit {
            return Err(PaymentError::LimitExceeded {
                kind: LimitKind::Monthly,
                attempted: monthly + amount,
                limit: account.monthly_limit,
            });
        }
        Ok(())
    }

    /// Completed withdrawals from `account_id` on the UTC day of `now`.
    async fn withdrawn_today(&self, account_id: &str, now: DateTime<Utc>) -> Result<Decimal> {
        let day = Period::day(now.date_naive());

        let total = self
            .transactions
            .get_by_period(day.start, day.end)
            .await?
            .iter()
            .filter(|t| {
                t.from_account.as_deref() == Some(account_id)
                    && t.r#type == TransactionType::Withdrawal
                    && t.status == TransactionStatus::Completed
            })
            .map(|t| t.amount)
            .sum();
        Ok(total)
    }

    async fn existing_account(&self, id: &str) -> Result<Account> {
        self.accounts
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::AccountNotFound(id.to_string()))
    }

    async fn active_account(&self, id: &str) -> Result<Account> {
        let account = self.existing_account(id).await?;
        ensure_active(&account)?;
        Ok(account)
    }
}

fn required<'a>(
    account: &'a Option<String>,
    role: &'static str,
    operation: &'static str,
) -> Result<&'a str> {
    account
        .as_deref()
        .ok_or(PaymentError::MissingAccount { role, operation })
}

fn ensure_active(account: &Account) -> Result<()> {
    if account.is_active() {
        Ok(())
    } else {
        Err(PaymentError::AccountInactive {
            id: account.id.clone(),
            status: account.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{AccountStatus, Balance};
    use crate::domain::ports::{AccountStore, TransactionStore};
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::in_memory::{InMemoryAccountStore, InMemoryTransactionStore};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Fixture {
        ledger: Ledger,
        accounts: Arc<InMemoryAccountStore>,
        transactions: Arc<InMemoryTransactionStore>,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    async fn fixture(accounts: Vec<Account>) -> Fixture {
        let account_store = Arc::new(InMemoryAccountStore::new());
        for account in accounts {
            account_store.save(account).await.unwrap();
        }
        let tx_store = Arc::new(InMemoryTransactionStore::new());
        let ledger = Ledger::new(
            account_store.clone(),
            tx_store.clone(),
            Arc::new(FixedClock::new(now())),
            LedgerConfig::default(),
        );
        Fixture {
            ledger,
            accounts: account_store,
            transactions: tx_store,
        }
    }

    async fn balance(f: &Fixture, id: &str) -> Balance {
        f.accounts.get(id).await.unwrap().unwrap().balance
    }

    fn deposit(id: &str, to: &str, amount: Decimal) -> Transaction {
        Transaction::with_id(id, TransactionType::Deposit, amount, "USD").with_destination(to)
    }

    fn withdrawal(id: &str, from: &str, amount: Decimal) -> Transaction {
        Transaction::with_id(id, TransactionType::Withdrawal, amount, "USD").with_source(from)
    }

    fn transfer(id: &str, from: &str, to: &str, amount: Decimal) -> Transaction {
        Transaction::with_id(id, TransactionType::Transfer, amount, "USD").with_accounts(from, to)
    }

    #[tokio::test]
    async fn test_deposit_credits_and_stamps_activity() {
        let f = fixture(vec![Account::new("a", "u", "USD").with_balance(dec!(10))]).await;
        f.ledger.apply(&deposit("t1", "a", dec!(40))).await.unwrap();

        let account = f.accounts.get("a").await.unwrap().unwrap();
        assert_eq!(account.balance, Balance::new(dec!(50)));
        assert_eq!(account.last_activity_at, now());
    }

    #[tokio::test]
    async fn test_deposit_ceiling_and_preconditions() {
        let f = fixture(vec![
            Account::new("a", "u", "USD"),
            Account::new("s", "u", "USD").with_status(AccountStatus::Suspended),
        ])
        .await;

        f.ledger.apply(&deposit("t1", "a", dec!(50000))).await.unwrap();
        assert!(matches!(
            f.ledger.apply(&deposit("t2", "a", dec!(50000.01))).await,
            Err(PaymentError::LimitExceeded { kind: LimitKind::Deposit, .. })
        ));
        assert!(matches!(
            f.ledger.apply(&deposit("t3", "s", dec!(1))).await,
            Err(PaymentError::AccountInactive { .. })
        ));
        assert!(matches!(
            f.ledger.apply(&deposit("t4", "ghost", dec!(1))).await,
            Err(PaymentError::AccountNotFound(_))
        ));
        let no_destination = Transaction::with_id("t5", TransactionType::Deposit, dec!(1), "USD");
        assert!(matches!(
            f.ledger.apply(&no_destination).await,
            Err(PaymentError::MissingAccount { role: "destination", .. })
        ));
        assert_eq!(balance(&f, "a").await, Balance::new(dec!(50000)));
    }

    #[tokio::test]
    async fn test_withdrawal_insufficient_funds_leaves_balance() {
        let f = fixture(vec![Account::new("a", "u", "USD").with_balance(dec!(100))]).await;
        assert!(matches!(
            f.ledger.apply(&withdrawal("t1", "a", dec!(100.01))).await,
            Err(PaymentError::InsufficientFunds(id)) if id == "a"
        ));
        assert_eq!(balance(&f, "a").await, Balance::new(dec!(100)));

        f.ledger.apply(&withdrawal("t2", "a", dec!(100))).await.unwrap();
        assert_eq!(balance(&f, "a").await, Balance::ZERO);
    }

    #[tokio::test]
    async fn test_daily_withdrawal_ceiling_counts_completed_withdrawals() {
        let f = fixture(vec![Account::new("a", "u", "USD").with_balance(dec!(20000))]).await;

        let mut earlier = withdrawal("w0", "a", dec!(4000)).with_created_at(now());
        earlier.status = TransactionStatus::Completed;
        f.transactions.save(earlier).await.unwrap();

        let mut pending = withdrawal("w1", "a", dec!(3000)).with_created_at(now());
        pending.status = TransactionStatus::Pending;
        f.transactions.save(pending).await.unwrap();

        f.ledger.apply(&withdrawal("t1", "a", dec!(1000))).await.unwrap();
        let err = f.ledger.apply(&withdrawal("t2", "a", dec!(1000.01))).await;
        assert!(matches!(
            err,
            Err(PaymentError::LimitExceeded { kind: LimitKind::DailyWithdrawal, .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_moves_and_conserves() {
        let f = fixture(vec![
            Account::new("x", "u", "USD").with_balance(dec!(300)),
            Account::new("y", "v", "USD").with_balance(dec!(20)),
        ])
        .await;
        f.ledger.apply(&transfer("t1", "x", "y", dec!(120))).await.unwrap();
        assert_eq!(balance(&f, "x").await, Balance::new(dec!(180)));
        assert_eq!(balance(&f, "y").await, Balance::new(dec!(140)));
    }

    #[tokio::test]
    async fn test_transfer_precondition_order() {
        let f = fixture(vec![
            Account::new("usd", "u", "USD").with_balance(dec!(10)),
            Account::new("eur", "u", "EUR").with_status(AccountStatus::Closed),
            Account::new("closed", "u", "USD").with_status(AccountStatus::Closed),
            Account::new("other", "u", "USD"),
        ])
        .await;

        assert!(matches!(
            f.ledger.apply(&transfer("t1", "usd", "eur", dec!(1))).await,
            Err(PaymentError::CurrencyMismatch(a, b)) if a == "USD" && b == "EUR"
        ));
        assert!(matches!(
            f.ledger.apply(&transfer("t2", "usd", "closed", dec!(1))).await,
            Err(PaymentError::AccountInactive { id, .. }) if id == "closed"
        ));
        assert!(matches!(
            f.ledger.apply(&transfer("t3", "usd", "other", dec!(11))).await,
            Err(PaymentError::InsufficientFunds(_))
        ));
        assert!(matches!(
            f.ledger.apply(&transfer("t4", "usd", "nobody", dec!(1))).await,
            Err(PaymentError::AccountNotFound(id)) if id == "nobody"
        ));
    }

    #[tokio::test]
    async fn test_transfer_volume_limits() {
        let f = fixture(vec![
            Account::new("x", "u", "USD")
                .with_balance(dec!(10000))
                .with_limits(dec!(500), dec!(800)),
            Account::new("y", "v", "USD"),
        ])
        .await;

        let mut yesterday = transfer("old", "x", "y", dec!(450))
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 14, 9, 0, 0).unwrap());
        yesterday.status = TransactionStatus::Completed;
        f.transactions.save(yesterday).await.unwrap();

        let mut today = transfer("today", "x", "y", dec!(300)).with_created_at(now());
        today.status = TransactionStatus::Completed;
        f.transactions.save(today).await.unwrap();

        assert!(matches!(
            f.ledger.apply(&transfer("t1", "x", "y", dec!(201))).await,
            Err(PaymentError::LimitExceeded { kind: LimitKind::Daily, .. })
        ));
        assert!(matches!(
            f.ledger.apply(&transfer("t2", "x", "y", dec!(60))).await,
            Err(PaymentError::LimitExceeded { kind: LimitKind::Monthly, .. })
        ));
        f.ledger.apply(&transfer("t3", "x", "y", dec!(50))).await.unwrap();
        assert_eq!(balance(&f, "x").await, Balance::new(dec!(9950)));
    }

    #[tokio::test]
    async fn test_transfer_to_itself_is_rejected() {
        let f = fixture(vec![Account::new("x", "u", "USD").with_balance(dec!(100))]).await;

        let err = f
            .ledger
            .apply(&transfer("t1", "x", "x", dec!(40)))
            .await
            .unwrap_err();
        assert!(matches!(&err, PaymentError::SameAccount(id) if id == "x"));
        assert!(err.is_precondition());
        assert_eq!(balance(&f, "x").await, Balance::new(dec!(100)));
    }

    #[tokio::test]
    async fn test_settle_records_completed_transaction() {
        let f = fixture(vec![Account::new("a", "u", "USD").with_balance(dec!(100))]).await;
        let mut tx = withdrawal("t1", "a", dec!(30)).with_created_at(now());

        f.ledger.settle(&mut tx).await.unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        let stored = f.transactions.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(balance(&f, "a").await, Balance::new(dec!(70)));
    }

    #[tokio::test]
    async fn test_settle_failure_saves_nothing() {
        let f = fixture(vec![Account::new("a", "u", "USD").with_balance(dec!(10))]).await;
        let mut tx = withdrawal("t1", "a", dec!(30)).with_created_at(now());

        assert!(matches!(
            f.ledger.settle(&mut tx).await,
            Err(PaymentError::InsufficientFunds(_))
        ));
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(f.transactions.get("t1").await.unwrap().is_none());
    }
}
