use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use txguard::application::processor::TransactionProcessor;
use txguard::config::Config;
use txguard::domain::ports::{AccountStore, RuleStore};
use txguard::infrastructure::events::ChannelEventSink;
use txguard::infrastructure::in_memory::{
    InMemoryAccountStore, InMemoryRuleStore, InMemoryTransactionStore,
};
use txguard::interfaces::csv::account_reader::AccountReader;
use txguard::interfaces::csv::account_writer::AccountWriter;
use txguard::interfaces::csv::transaction_reader::TransactionReader;
use txguard::interfaces::rules::read_rules;
use txguard::logging;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input transactions CSV file
    input: PathBuf,

    /// Accounts CSV file loaded before processing
    #[arg(long)]
    accounts: PathBuf,

    /// JSON file with an array of rules
    #[arg(long)]
    rules: Option<PathBuf>,

    /// TOML configuration file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load(path).into_diagnostic()?,
        None => Config::default(),
    };

    let accounts = Arc::new(InMemoryAccountStore::new());
    let file = File::open(&cli.accounts).into_diagnostic()?;
    for account in AccountReader::new(file).accounts() {
        accounts.save(account.into_diagnostic()?).await.into_diagnostic()?;
    }

    let rules = Arc::new(InMemoryRuleStore::new());
    if let Some(path) = &cli.rules {
        let file = File::open(path).into_diagnostic()?;
        for rule in read_rules(file).into_diagnostic()? {
            rules.save(rule).await.into_diagnostic()?;
        }
    }

    let (sink, mut events) = ChannelEventSink::bounded(config.events.queue_capacity);
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::warn!(
                transaction_id = %event.transaction_id,
                event_type = %event.event_type,
                payload = %event.payload,
                "Event"
            );
        }
    });

    let processor = TransactionProcessor::new(
        Arc::new(InMemoryTransactionStore::new()),
        accounts.clone(),
        rules,
        Arc::new(sink),
        &config,
    );
    let cancel = CancellationToken::new();

    // Process transactions
    let file = File::open(&cli.input).into_diagnostic()?;
    for tx_result in TransactionReader::new(file).transactions() {
        match tx_result {
            Ok(mut tx) => {
                if let Err(e) = processor.validator().validate_amount(tx.amount, &tx.currency) {
                    eprintln!("Rejected transaction {}: {}", tx.id(), e);
                    continue;
                }
                match processor.process_transaction(&mut tx, &cancel).await {
                    Ok(outcome) => tracing::info!(
                        transaction_id = %tx.id(),
                        status = %outcome.status,
                        risk_score = outcome.risk_score.value(),
                        rules = outcome.triggered_rules.len(),
                        "Processed"
                    ),
                    Err(e) => eprintln!("Error processing transaction {}: {}", tx.id(), e),
                }
            }
            Err(e) => {
                eprintln!("Error reading transaction: {}", e);
            }
        }
    }

    let metrics = processor.metrics();
    tracing::info!(?metrics, "Run finished");

    // Closing the sink ends the drain loop.
    drop(processor);
    drain.await.into_diagnostic()?;

    // Output final state
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer
        .write_accounts(accounts.get_all().await.into_diagnostic()?)
        .into_diagnostic()?;

    Ok(())
}
