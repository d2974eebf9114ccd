use crate::domain::transaction::{Transaction, TransactionType};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a transactions file.
///
/// `location` and `velocity` are copied into the transaction metadata. An empty
/// `id` gets a generated identifier.
#[derive(Debug, Deserialize)]
struct TransactionRecord {
    #[serde(default)]
    id: Option<String>,
    r#type: TransactionType,
    amount: Decimal,
    currency: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    velocity: Option<String>,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        let mut tx = match record.id.filter(|id| !id.is_empty()) {
            Some(id) => Transaction::with_id(id, record.r#type, record.amount, record.currency),
            None => Transaction::new(record.r#type, record.amount, record.currency),
        }
        .with_accounts(record.from.unwrap_or_default(), record.to.unwrap_or_default())
        .with_description(record.description.unwrap_or_default());

        for (key, value) in [("location", record.location), ("velocity", record.velocity)] {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                tx.add_metadata(key, value);
            }
        }
        tx
    }
}

/// Reads transactions from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<Transaction>`.
/// It trims whitespace and tolerates short rows.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    /// Creates a new `TransactionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes transactions, so
    /// large files are streamed rather than loaded whole.
    pub fn transactions(self) -> impl Iterator<Item = Result<Transaction>> {
        self.reader
            .into_deserialize::<TransactionRecord>()
            .map(|result| result.map(Transaction::from).map_err(PaymentError::from))
    }
}
