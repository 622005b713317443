use ledgerflow::generate::{write_transactions, GeneratorConfig};

use anyhow::Context;
use chrono::{Local, Months, NaiveDate};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{stdout, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const MAX_RANDOM_COUNT: u64 = 10_000;

/// Generate a random transaction CSV for ledgerflow
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// File to write transactions to (stdout when omitted)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Seed for the random generator (a fresh one when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of transactions; 0 picks a random count
    #[arg(long, default_value_t = 1000)]
    count: u64,

    /// Earliest date, YYYY-MM-DD (defaults to one year ago)
    #[arg(long)]
    date_min: Option<NaiveDate>,

    /// Latest date, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    date_max: Option<NaiveDate>,

    /// Smallest amount
    #[arg(long, default_value = "0")]
    amount_min: Decimal,

    /// Largest amount
    #[arg(long, default_value = "10000")]
    amount_max: Decimal,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);

    let today = Local::now().date_naive();
    let count = match args.count {
        0 => rng.gen_range(0..MAX_RANDOM_COUNT),
        n => n,
    };
    let config = GeneratorConfig {
        count,
        date_min: args
            .date_min
            .unwrap_or_else(|| today.checked_sub_months(Months::new(12)).unwrap_or(today)),
        date_max: args.date_max.unwrap_or(today),
        amount_min: args.amount_min,
        amount_max: args.amount_max,
    };

    let writer: Box<dyn Write> = match &args.file {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(stdout().lock()),
    };

    let written = write_transactions(&config, &mut rng, writer)?;
    info!(seed, rows = written, "transactions generated");

    Ok(())
}
