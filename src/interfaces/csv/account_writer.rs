use crate::domain::account::{Account, AccountStatus, Balance};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    id: &'a str,
    owner: &'a str,
    balance: String,
    currency: &'a str,
    status: AccountStatus,
}

/// Writes account balances as CSV with an `id,owner,balance,currency,status` header.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes every account, sorted by id so output is deterministic.
    pub fn write_accounts(&mut self, mut accounts: Vec<Account>) -> Result<()> {
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        for account in &accounts {
            self.writer.serialize(AccountRow {
                id: &account.id,
                owner: &account.owner_id,
                balance: format_balance(account.balance),
                currency: account.currency(),
                status: account.status,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

fn format_balance(balance: Balance) -> String {
    format!("{:.2}", balance.value())
}
