use ledgerflow::{
    account::Account,
    config::{PipelineConfig, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS},
    engine::Engine,
    open_rows,
    store::{CsvStore, MemoryStore, TransactionStore},
};

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Ingest a transaction CSV for one account and print its balance report
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Path to the transaction CSV file
    #[arg(long, default_value = "transactions.csv")]
    file: PathBuf,

    /// Account the transactions belong to
    #[arg(long)]
    account_id: i64,

    /// Number of concurrent workers
    #[arg(long, env = "LEDGERFLOW_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Rows buffered ahead of the workers
    #[arg(long, env = "LEDGERFLOW_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Year for the month/day dates in the file (defaults to the current year)
    #[arg(long)]
    year: Option<i32>,

    /// Write accepted transactions to this CSV ledger instead of keeping them in memory
    #[arg(long)]
    ledger: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    validate_csv_file(&args.file)?;
    process_transactions(args).await
}

fn validate_csv_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        bail!("file '{}' does not exist", path.display());
    }

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        bail!("file '{}' is not a CSV file", path.display());
    }

    Ok(())
}

async fn process_transactions(args: Args) -> anyhow::Result<()> {
    let mut config = PipelineConfig::new(args.workers, args.batch_size)?;
    if let Some(year) = args.year {
        config = config.with_year(year);
    }

    let ledger = match &args.ledger {
        Some(path) => Some(Arc::new(
            CsvStore::create(path)
                .with_context(|| format!("creating ledger {}", path.display()))?,
        )),
        None => None,
    };
    let store: Arc<dyn TransactionStore> = match &ledger {
        Some(ledger) => ledger.clone(),
        None => Arc::new(MemoryStore::new()),
    };

    // Ctrl-C fails the remaining inserts; the file is still read to the end.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, remaining inserts will be rejected");
            on_signal.cancel();
        }
    });

    info!(file = %args.file.display(), "processing transactions");
    let mut rows = open_rows(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;

    let engine = Engine::new(config, store).with_cancellation(cancel);
    let report = engine.process_file(args.account_id, &mut rows).await?;

    if let Some(ledger) = ledger {
        ledger.flush()?;
    }

    let mut account = Account::new(args.account_id);
    account.apply_report(&report, Utc::now());
    info!(
        account_id = account.account_id,
        total_balance = ?account.total_balance,
        "account balance updated"
    );

    match args.format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &report)?;
            println!();
        }
        Format::Text => report.dump_summary(stdout())?,
    }

    Ok(())
}
