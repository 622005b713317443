use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a single row is rejected before it becomes a transaction.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid transaction id: {0:?}")]
    InvalidId(String),

    #[error("invalid transaction date: {0:?}")]
    InvalidDate(String),

    #[error("not a calendar day in {year}: {value:?}")]
    InvalidCalendarDay { value: String, year: i32 },

    #[error("invalid transaction operation and amount: {0:?}")]
    InvalidAmount(String),

    #[error("amount cannot be represented exactly: {0:?}")]
    UnrepresentableAmount(String),
}

/// A running total that cannot take another amount without losing it.
#[derive(Debug, Error, PartialEq)]
pub enum AccountingError {
    #[error("adding {amount} to {total} overflows")]
    Overflow { total: Decimal, amount: Decimal },

    #[error("adding {amount} to {total} would round the result")]
    PrecisionLoss { total: Decimal, amount: Decimal },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("persistence cancelled")]
    Cancelled,

    #[error("ledger write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("ledger io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("insert rejected: {message}")]
    Rejected { message: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("error reading header: input is empty")]
    MissingHeader,

    #[error("error reading header: {0}")]
    Header(#[source] csv::Error),

    #[error("malformed row: {0}")]
    Malformed(#[source] csv::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("worker count must be positive")]
    NoWorkers,

    #[error("batch size must be positive")]
    EmptyBatch,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{missing} of {expected} workers ended without reporting")]
    WorkerLost { missing: usize, expected: usize },

    #[error("merging worker reports failed: {0}")]
    Accounting(#[from] AccountingError),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("date range is empty: {min} is after {max}")]
    InvalidDateRange {
        min: chrono::NaiveDate,
        max: chrono::NaiveDate,
    },

    #[error("amount range must be non-negative and ordered, got {min}..={max}")]
    InvalidAmountRange { min: Decimal, max: Decimal },

    #[error("writing transactions failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("writing transactions failed: {0}")]
    Io(#[from] std::io::Error),
}
