//! Persistence for accepted transactions.
//!
//! The pipeline only needs an insert-one operation. Implementations must
//! accept concurrent inserts from every worker without outside locking.

use crate::engine::transaction::Transaction;
use crate::error::StoreError;

use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task;

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Inserts one transaction and returns its store-assigned id.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<i64, StoreError>;
}

/// Keeps every inserted transaction in memory.
#[derive(Default)]
pub struct MemoryStore {
    next_id: AtomicI64,
    transactions: Mutex<Vec<(i64, Transaction)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<(i64, Transaction)> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(i64, Transaction)>> {
        // A poisoned lock only means another insert panicked mid-push.
        self.transactions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<i64, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().push((id, tx.clone()));
        Ok(id)
    }
}

/// Appends accepted transactions to a CSV ledger file.
///
/// Writes run on tokio's blocking pool so a slow disk never stalls the
/// workers' runtime threads.
pub struct CsvStore {
    ledger: Arc<Mutex<Ledger>>,
}

struct Ledger {
    next_id: i64,
    writer: csv::Writer<File>,
}

pub const LEDGER_HEADER: [&str; 7] = [
    "transaction_id",
    "account_id",
    "operation",
    "amount",
    "performed_at",
    "created_at",
    "updated_at",
];

impl CsvStore {
    /// Creates (or truncates) the ledger at `path` and writes its header.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        writer.write_record(LEDGER_HEADER)?;
        writer.flush()?;

        Ok(Self {
            ledger: Arc::new(Mutex::new(Ledger { next_id: 0, writer })),
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let mut ledger = self.ledger.lock().map_err(|_| poisoned())?;
        ledger.writer.flush()?;
        Ok(())
    }
}

fn poisoned() -> StoreError {
    StoreError::Io(io::Error::other("ledger writer lock poisoned"))
}

#[async_trait]
impl TransactionStore for CsvStore {
    async fn insert_transaction(&self, tx: &Transaction) -> Result<i64, StoreError> {
        let ledger = Arc::clone(&self.ledger);
        let fields = [
            tx.account_id.to_string(),
            tx.operation.as_str().to_string(),
            tx.amount.to_string(),
            tx.performed_at.to_string(),
            tx.created_at.to_rfc3339(),
            tx.updated_at.to_rfc3339(),
        ];

        task::spawn_blocking(move || -> Result<i64, StoreError> {
            let mut ledger = ledger.lock().map_err(|_| poisoned())?;
            // Ids are taken under the lock so the file stays in id order.
            ledger.next_id += 1;
            let id = ledger.next_id;

            ledger.writer.write_field(id.to_string())?;
            ledger.writer.write_record(&fields)?;

            Ok(id)
        })
        .await
        .map_err(|e| StoreError::Io(io::Error::other(e)))?
    }
}
