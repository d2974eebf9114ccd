use crate::config::ValidatorConfig;
use crate::domain::ports::SharedClock;
use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{PaymentError, Result, ValidationErrors, ValidationIssue};
use chrono::Duration;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Syntactic and semantic checks run before any other pipeline stage.
///
/// Also remembers every identifier it has been shown, so a replayed
/// transaction is rejected even if the first attempt failed validation.
pub struct TransactionValidator {
    config: ValidatorConfig,
    clock: SharedClock,
    seen: Mutex<HashSet<String>>,
}

impl TransactionValidator {
    pub fn new(config: ValidatorConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns `DuplicateTransaction` for a previously seen identifier, otherwise
    /// registers it and reports every violation found as one `Validation` error.
    pub fn validate_transaction(&self, tx: &Transaction) -> Result<()> {
        if !self.seen.lock().insert(tx.id().to_string()) {
            return Err(PaymentError::DuplicateTransaction(tx.id().to_string()));
        }

        let mut issues = Vec::new();

        if tx.amount <= Decimal::ZERO {
            issues.push(ValidationIssue::InvalidAmount);
        }

        if !is_currency_code(&tx.currency) {
            issues.push(ValidationIssue::InvalidCurrency);
        }

        if tx.r#type == TransactionType::Transfer {
            if tx.from_account.is_none() || tx.to_account.is_none() {
                issues.push(ValidationIssue::InvalidAccount);
            }
            // Two absent accounts are also the same account.
            if tx.from_account == tx.to_account {
                issues.push(ValidationIssue::SameAccount);
            }
        }

        let horizon = self.clock.now() + Duration::seconds(self.config.max_future_skew_secs);
        if tx.created_at > horizon {
            issues.push(ValidationIssue::FutureTimestamp);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(PaymentError::Validation(ValidationErrors(issues)))
        }
    }

    /// Enforces the per-currency ceiling table. Independent of
    /// `validate_transaction`; unknown currencies are unrestricted.
    pub fn validate_amount(&self, amount: Decimal, currency: &str) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        match self.config.currency_ceilings.get(currency) {
            Some(limit) if amount > *limit => Err(PaymentError::AmountCeilingExceeded {
                currency: currency.to_string(),
                limit: *limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.lock().len()
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn validator() -> TransactionValidator {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        TransactionValidator::new(ValidatorConfig::default(), Arc::new(FixedClock::new(now)))
    }

    fn deposit(id: &str, amount: Decimal, currency: &str) -> Transaction {
        Transaction::with_id(id, TransactionType::Deposit, amount, currency)
            .with_destination("acc")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap())
    }

    fn issues(result: Result<()>) -> Vec<ValidationIssue> {
        match result {
            Err(PaymentError::Validation(errors)) => errors.0,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_transaction_passes() {
        validator()
            .validate_transaction(&deposit("t1", dec!(10), "USD"))
            .unwrap();
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let v = validator();
        for (i, amount) in [dec!(0), dec!(-0.01), dec!(-500)].into_iter().enumerate() {
            let found = issues(v.validate_transaction(&deposit(&format!("t{i}"), amount, "USD")));
            assert_eq!(found, vec![ValidationIssue::InvalidAmount]);
        }
    }

    #[test]
    fn test_bad_currency_codes_rejected() {
        let v = validator();
        for (i, code) in ["usd", "US", "USDT", "U5D", ""].into_iter().enumerate() {
            let found = issues(v.validate_transaction(&deposit(&format!("c{i}"), dec!(1), code)));
            assert!(found.contains(&ValidationIssue::InvalidCurrency), "{code}");
        }
    }

    #[test]
    fn test_transfer_account_checks() {
        let v = validator();
        let missing = Transaction::with_id("t1", TransactionType::Transfer, dec!(1), "USD")
            .with_source("a")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap());
        assert_eq!(issues(v.validate_transaction(&missing)), vec![ValidationIssue::InvalidAccount]);

        let same = Transaction::with_id("t2", TransactionType::Transfer, dec!(1), "USD")
            .with_accounts("a", "a")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap());
        assert_eq!(issues(v.validate_transaction(&same)), vec![ValidationIssue::SameAccount]);

        let neither = Transaction::with_id("t3", TransactionType::Transfer, dec!(1), "USD")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 11, 0, 0).unwrap());
        assert_eq!(
            issues(v.validate_transaction(&neither)),
            vec![ValidationIssue::InvalidAccount, ValidationIssue::SameAccount]
        );
    }

    #[test]
    fn test_future_timestamp_beyond_skew() {
        let v = validator();
        let within = deposit("t1", dec!(1), "USD")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 12, 4, 59).unwrap());
        v.validate_transaction(&within).unwrap();

        let beyond = deposit("t2", dec!(1), "USD")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 1, 12, 5, 1).unwrap());
        assert_eq!(issues(v.validate_transaction(&beyond)), vec![ValidationIssue::FutureTimestamp]);
    }

    #[test]
    fn test_errors_are_aggregated_in_order() {
        let v = validator();
        let tx = Transaction::with_id("t1", TransactionType::Transfer, dec!(-1), "eur")
            .with_accounts("a", "a")
            .with_created_at(Utc.with_ymd_and_hms(2026, 6, 2, 0, 0, 0).unwrap());
        assert_eq!(
            issues(v.validate_transaction(&tx)),
            vec![
                ValidationIssue::InvalidAmount,
                ValidationIssue::InvalidCurrency,
                ValidationIssue::SameAccount,
                ValidationIssue::FutureTimestamp,
            ]
        );
    }

    #[test]
    fn test_duplicate_only_on_second_call() {
        let v = validator();
        let tx = deposit("dup", dec!(5), "USD");
        v.validate_transaction(&tx).unwrap();
        assert!(matches!(
            v.validate_transaction(&tx),
            Err(PaymentError::DuplicateTransaction(id)) if id == "dup"
        ));
        assert_eq!(v.seen_count(), 1);
    }

    #[test]
    fn test_failed_first_attempt_still_registers_id() {
        let v = validator();
        let bad = deposit("t1", dec!(0), "USD");
        assert!(matches!(v.validate_transaction(&bad), Err(PaymentError::Validation(_))));

        let fixed = deposit("t1", dec!(10), "USD");
        assert!(matches!(
            v.validate_transaction(&fixed),
            Err(PaymentError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn test_validate_amount_ceilings() {
        let v = validator();
        v.validate_amount(dec!(1000000), "USD").unwrap();
        assert!(matches!(
            v.validate_amount(dec!(1000000.01), "USD"),
            Err(PaymentError::AmountCeilingExceeded { .. })
        ));
        assert!(v.validate_amount(dec!(900001), "EUR").is_err());
        assert!(v.validate_amount(dec!(800001), "GBP").is_err());
        v.validate_amount(dec!(5000000), "JPY").unwrap();
        assert!(matches!(
            v.validate_amount(dec!(0), "JPY"),
            Err(PaymentError::InvalidAmount)
        ));
    }
}
