use crate::application::fraud::FraudDetector;
use crate::application::ledger::Ledger;
use crate::application::rules::{RuleEngine, RuleResult};
use crate::application::validator::TransactionValidator;
use crate::config::{Config, RiskConfig};
use crate::domain::ports::{
    SharedAccountStore, SharedClock, SharedEventSink, SharedRuleStore, SharedTransactionStore,
};
use crate::domain::transaction::{RiskScore, Transaction, TransactionEvent, TransactionStatus};
use crate::error::{PaymentError, Result};
use crate::infrastructure::clock::SystemClock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// What happened to a transaction that made it through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub status: TransactionStatus,
    pub risk_score: RiskScore,
    pub flags: Vec<String>,
    /// Triggered rules, ascending by priority. Their actions have not been applied.
    pub triggered_rules: Vec<RuleResult>,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    completed: AtomicU64,
    pending_review: AtomicU64,
    suspicious: AtomicU64,
}

impl Counters {
    fn record(&self, status: TransactionStatus) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let counter = match status {
            TransactionStatus::Completed => &self.completed,
            TransactionStatus::Suspicious => &self.suspicious,
            _ => &self.pending_review,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("transactions_processed", self.processed.load(Ordering::Relaxed)),
            ("transactions_completed", self.completed.load(Ordering::Relaxed)),
            (
                "transactions_pending_review",
                self.pending_review.load(Ordering::Relaxed),
            ),
            ("transactions_suspicious", self.suspicious.load(Ordering::Relaxed)),
        ])
    }
}

/// The main entry point for transaction processing.
///
/// Runs validate → score → evaluate rules → route by risk → ledger → persist.
/// Safe to share between tasks; balance mutation is serialized by the
/// [`Ledger`].
pub struct TransactionProcessor {
    transactions: SharedTransactionStore,
    validator: TransactionValidator,
    fraud: FraudDetector,
    rules: Arc<RuleEngine>,
    ledger: Ledger,
    events: SharedEventSink,
    clock: SharedClock,
    risk: RiskConfig,
    counters: Counters,
}

impl TransactionProcessor {
    pub fn new(
        transactions: SharedTransactionStore,
        accounts: SharedAccountStore,
        rules: SharedRuleStore,
        events: SharedEventSink,
        config: &Config,
    ) -> Self {
        Self::with_clock(
            transactions,
            accounts,
            rules,
            events,
            config,
            Arc::new(SystemClock),
        )
    }

    /// Same as `new` but reads wall-clock time from `clock`.
    pub fn with_clock(
        transactions: SharedTransactionStore,
        accounts: SharedAccountStore,
        rules: SharedRuleStore,
        events: SharedEventSink,
        config: &Config,
        clock: SharedClock,
    ) -> Self {
        Self {
            validator: TransactionValidator::new(config.validator.clone(), clock.clone()),
            fraud: FraudDetector::new(&config.fraud),
            rules: Arc::new(RuleEngine::new(rules)),
            ledger: Ledger::new(
                accounts,
                transactions.clone(),
                clock.clone(),
                config.ledger.clone(),
            ),
            transactions,
            events,
            clock,
            risk: config.risk.clone(),
            counters: Counters::default(),
        }
    }

    /// Replaces the fraud detector.
    pub fn with_fraud_detector(mut self, detector: FraudDetector) -> Self {
        self.fraud = detector;
        self
    }

    /// Processes one transaction, annotating it in place.
    ///
    /// Cancellation is honoured at entry and while waiting for event queue
    /// space. A ledger failure is returned with the transaction still pending
    /// and nothing persisted.
    pub async fn process_transaction(
        &self,
        tx: &mut Transaction,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome> {
        if cancel.is_cancelled() {
            return Err(PaymentError::Cancelled);
        }

        self.validator.validate_transaction(tx)?;

        let (risk_score, flags) = self.fraud.analyze(tx, self.clock.now());
        tx.risk_score = risk_score;
        tx.fraud_flags = flags;

        let triggered_rules = self.rules.evaluate_rules(tx).await?;

        if risk_score.value() > self.risk.suspicious_above {
            tx.status = TransactionStatus::Suspicious;
            tracing::warn!(
                transaction_id = %tx.id(),
                risk_score = risk_score.value(),
                flags = ?tx.fraud_flags,
                "Suspicious transaction, ledger skipped"
            );
            let event = TransactionEvent::suspicious(tx, self.clock.now());
            tokio::select! {
                published = self.events.publish(event) => published?,
                _ = cancel.cancelled() => return Err(PaymentError::Cancelled),
            }
            self.transactions.save(tx.clone()).await?;
        } else if risk_score.value() > self.risk.review_above {
            tx.status = TransactionStatus::Pending;
            tracing::info!(
                transaction_id = %tx.id(),
                risk_score = risk_score.value(),
                "Transaction held for review"
            );
            self.transactions.save(tx.clone()).await?;
        } else {
            self.ledger.settle(tx).await?;
        }

        self.counters.record(tx.status);

        Ok(ProcessOutcome {
            status: tx.status,
            risk_score: tx.risk_score,
            flags: tx.fraud_flags.clone(),
            triggered_rules,
        })
    }

    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.transactions.get(id).await
    }

    /// Snapshot of the in-process counters.
    pub fn metrics(&self) -> BTreeMap<&'static str, u64> {
        self.counters.snapshot()
    }

    pub fn validator(&self) -> &TransactionValidator {
        &self.validator
    }

    pub fn rule_engine(&self) -> Arc<RuleEngine> {
        Arc::clone(&self.rules)
    }
}
