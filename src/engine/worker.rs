use crate::engine::transaction::Transaction;
use crate::error::StoreError;
use crate::report::PartialReport;
use crate::store::TransactionStore;
use crate::transaction::RawRow;

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Input queue shared by every worker. Each row is received by exactly one.
pub type SharedRows = Arc<Mutex<mpsc::Receiver<RawRow>>>;

/// One lane of the ingestion pool.
pub struct Worker {
    pub id: usize,
    pub account_id: i64,
    pub year: i32,
    pub store: Arc<dyn TransactionStore>,
    pub cancel: CancellationToken,
    pub rows: SharedRows,
    pub reports: mpsc::Sender<PartialReport>,
}

impl Worker {
    /// Drains the queue until it is closed, then sends one report.
    pub async fn run(self) {
        let started = Instant::now();
        let mut report = PartialReport::new();
        let mut inserted = 0u64;

        while let Some(row) = self.next_row().await {
            let record = match row.validate(self.year) {
                Ok(record) => record,
                Err(e) => {
                    warn!(worker = self.id, row = ?row, error = %e, "error validating transaction");
                    report.record_error();
                    continue;
                }
            };

            let tx = Transaction::from_record(self.account_id, record, Utc::now());
            if let Err(e) = report.record(&tx) {
                warn!(worker = self.id, row = ?row, error = %e, "error accounting transaction");
                report.record_error();
                continue;
            }

            match self.persist(&tx).await {
                Ok(_) => inserted += 1,
                Err(e) => {
                    warn!(worker = self.id, row = ?row, error = %e, "error inserting transaction");
                    report.revert(&tx);
                    report.record_error();
                }
            }
        }

        info!(
            worker = self.id,
            inserted,
            errors = report.error_count,
            elapsed = ?started.elapsed(),
            "worker finished"
        );

        // Capacity is reserved for every worker, so this only fails if the
        // orchestrator is gone.
        if self.reports.send(report).await.is_err() {
            warn!(worker = self.id, "report dropped, nobody is listening");
        }
    }

    async fn next_row(&self) -> Option<RawRow> {
        self.rows.lock().await.recv().await
    }

    async fn persist(&self, tx: &Transaction) -> Result<i64, StoreError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            result = self.store.insert_transaction(tx) => result,
        }
    }
}
