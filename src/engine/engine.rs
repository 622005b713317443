use crate::config::PipelineConfig;
use crate::engine::worker::Worker;
use crate::error::{PipelineError, SourceError};
use crate::report::{BalanceReport, PartialReport, ReportMerger};
use crate::source::RowSource;
use crate::store::TransactionStore;
use crate::transaction::RawRow;

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Fans rows out to a fixed worker pool and merges what comes back.
pub struct Engine {
    config: PipelineConfig,
    store: Arc<dyn TransactionStore>,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(config: PipelineConfig, store: Arc<dyn TransactionStore>) -> Self {
        Self {
            config,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` for every insert; cancelling it fails the remaining
    /// inserts as row errors but does not stop the pool.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn process_file<S: RowSource>(
        &self,
        account_id: i64,
        source: &mut S,
    ) -> Result<BalanceReport, PipelineError> {
        let workers = self.config.workers();
        let (queue, rows) = mpsc::channel::<RawRow>(self.config.batch_size());
        let (reports_tx, mut reports) = mpsc::channel::<PartialReport>(workers);
        let rows = Arc::new(Mutex::new(rows));

        for id in 0..workers {
            let worker = Worker {
                id,
                account_id,
                year: self.config.year(),
                store: Arc::clone(&self.store),
                cancel: self.cancel.clone(),
                rows: Arc::clone(&rows),
                reports: reports_tx.clone(),
            };
            tokio::spawn(worker.run());
        }
        drop(reports_tx);
        drop(rows);

        info!(account_id, workers, batch_size = self.config.batch_size(), "processing file");

        // `feed` owns the queue sender, so the queue is closed on every
        // return path, including a fatal read.
        let fed = feed(source, queue).await;

        // Keep receiving after a failed merge so no worker is left behind.
        let mut merger = ReportMerger::new(account_id);
        let mut merged = Ok(());
        let mut received = 0;
        while received < workers {
            match reports.recv().await {
                Some(partial) => {
                    received += 1;
                    if merged.is_ok() {
                        merged = merger.merge(&partial);
                    }
                }
                None => break,
            }
        }

        let fed = fed.inspect_err(|e| error!(account_id, error = %e, "aborting file"))?;
        if received < workers {
            return Err(PipelineError::WorkerLost {
                missing: workers - received,
                expected: workers,
            });
        }
        merged?;

        let report = merger.finish()?;
        info!(
            account_id,
            rows = fed,
            credits = report.count_credit,
            debits = report.count_debit,
            errors = report.error_count,
            "file processed"
        );

        Ok(report)
    }
}

async fn feed<S: RowSource>(
    source: &mut S,
    queue: mpsc::Sender<RawRow>,
) -> Result<u64, SourceError> {
    // Row reads are synchronous and run on the orchestrator's thread; the
    // queue bound keeps at most `batch_size` rows buffered ahead.
    source.read_header()?;

    let mut fed = 0u64;
    while let Some(row) = source.next_row()? {
        if queue.send(row).await.is_err() {
            // Every worker is gone; the fan-in reports it.
            break;
        }
        fed += 1;
    }

    debug!(rows = fed, "end of input");
    Ok(fed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::transaction::Transaction;
    use crate::error::{AccountingError, StoreError};
    use crate::source::CsvRowSource;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn engine(workers: usize, batch_size: usize, store: Arc<dyn TransactionStore>) -> Engine {
        let config = PipelineConfig::new(workers, batch_size).unwrap().with_year(2024);
        Engine::new(config, store)
    }

    async fn process(content: &str, workers: usize) -> Result<BalanceReport, PipelineError> {
        let store = Arc::new(MemoryStore::new());
        let mut source = CsvRowSource::new(content.as_bytes());
        engine(workers, 1, store).process_file(1, &mut source).await
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    struct FailingStore;

    /// Holds each insert until the barrier fills.
    struct GatedStore {
        gate: tokio::sync::Barrier,
    }

    #[async_trait]
    impl TransactionStore for GatedStore {
        async fn insert_transaction(&self, _tx: &Transaction) -> Result<i64, StoreError> {
            self.gate.wait().await;
            Ok(1)
        }
    }

    #[async_trait]
    impl TransactionStore for FailingStore {
        async fn insert_transaction(&self, _tx: &Transaction) -> Result<i64, StoreError> {
            Err(StoreError::Rejected {
                message: "duplicate key".to_string(),
            })
        }
    }

    mod process_file_tests {
        use super::*;

        #[tokio::test]
        async fn test_single_credit() {
            let report = process("ID,DATE,AMOUNT\n1,01/01,+1.50", 1).await.unwrap();

            assert_eq!(report.account_id, 1);
            assert_eq!(report.count_credit, 1);
            assert_eq!(report.total_credit, dec("1.50"));
            assert_eq!(report.count_debit, 0);
            assert_eq!(report.total_debit, dec("0.00"));
            assert_eq!(report.total_balance, dec("1.50"));
            assert_eq!(report.avg_credit_amount, dec("1.50"));
            assert_eq!(report.avg_debit_amount, dec("0.00"));
            assert_eq!(report.transactions_by_month, BTreeMap::from([(1, 1)]));
            assert_eq!(report.error_count, 0);
        }

        #[tokio::test]
        async fn test_single_debit() {
            let report = process("ID,DATE,AMOUNT\n1,01/01,-1.50", 1).await.unwrap();

            assert_eq!(report.count_credit, 0);
            assert_eq!(report.total_credit, dec("0.00"));
            assert_eq!(report.count_debit, 1);
            assert_eq!(report.total_debit, dec("1.50"));
            assert_eq!(report.total_balance, dec("-1.50"));
            assert_eq!(report.avg_credit_amount, dec("0.00"));
            assert_eq!(report.avg_debit_amount, dec("1.50"));
            assert_eq!(report.transactions_by_month, BTreeMap::from([(1, 1)]));
        }

        #[tokio::test]
        async fn test_invalid_row_is_counted_not_fatal() {
            let store = Arc::new(MemoryStore::new());
            let mut source = CsvRowSource::new("ID,DATE,AMOUNT\nA,B,C".as_bytes());
            let report = engine(1, 1, store.clone())
                .process_file(1, &mut source)
                .await
                .unwrap();

            assert_eq!(report.error_count, 1);
            assert_eq!(report.count_credit + report.count_debit, 0);
            assert!(report.transactions_by_month.is_empty());
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn test_header_only() {
            let report = process("ID,DATE,AMOUNT\n", 3).await.unwrap();

            assert_eq!(report.count_credit, 0);
            assert_eq!(report.count_debit, 0);
            assert_eq!(report.error_count, 0);
            assert_eq!(report.total_balance, Decimal::ZERO);
        }

        #[tokio::test]
        async fn test_missing_header_is_fatal() {
            let result = process("", 2).await;
            assert!(matches!(
                result,
                Err(PipelineError::Source(SourceError::MissingHeader))
            ));
        }

        #[tokio::test]
        async fn test_malformed_row_is_fatal() {
            let store = Arc::new(MemoryStore::new());
            let bytes: &[u8] = b"ID,DATE,AMOUNT\n1,01/01,+1\n2,01/02,\xff\n";
            let mut source = CsvRowSource::new(bytes);
            let result = engine(2, 1, store).process_file(1, &mut source).await;

            assert!(matches!(
                result,
                Err(PipelineError::Source(SourceError::Malformed(_)))
            ));
        }

        #[tokio::test]
        async fn test_field_count_mismatch_stops_reading() {
            let report = process("ID,DATE,AMOUNT\n1,01/01,+1\n2,01/02\n3,01/03,+1\n", 2)
                .await
                .unwrap();

            assert_eq!(report.count_credit, 1);
            assert_eq!(report.error_count, 0);
        }

        #[tokio::test]
        async fn test_many_rows_many_workers() {
            let mut content = String::from("id,date,amount\n");
            for i in 1..=500u32 {
                let month = i % 12 + 1;
                let sign = if i % 3 == 0 { '-' } else { '+' };
                content.push_str(&format!("{},{:02}/10,{}{}.25\n", i, month, sign, i));
            }
            content.push_str("501,02/30,+1\n502,01/01,*1\n");

            let store = Arc::new(MemoryStore::new());
            let mut source = CsvRowSource::new(content.as_bytes());
            let report = engine(7, 4, store.clone())
                .process_file(11, &mut source)
                .await
                .unwrap();

            let expected_credit: Decimal = (1..=500u32)
                .filter(|i| i % 3 != 0)
                .map(|i| Decimal::from(i) + dec("0.25"))
                .sum();
            let expected_debit: Decimal = (1..=500u32)
                .filter(|i| i % 3 == 0)
                .map(|i| Decimal::from(i) + dec("0.25"))
                .sum();

            assert_eq!(report.count_credit + report.count_debit + report.error_count, 502);
            assert_eq!(report.count_debit, 166);
            assert_eq!(report.count_credit, 334);
            assert_eq!(report.error_count, 2);
            assert_eq!(report.total_credit, expected_credit);
            assert_eq!(report.total_debit, expected_debit);
            assert_eq!(report.total_balance, expected_credit - expected_debit);
            assert_eq!(
                report.transactions_by_month.values().sum::<u64>(),
                report.count_credit + report.count_debit
            );
            assert_eq!(store.len(), 500);
            assert!(store.transactions().iter().all(|(_, tx)| tx.account_id == 11));
        }

        #[tokio::test]
        async fn test_store_failure_is_a_row_error() {
            let mut source = CsvRowSource::new("id,date,amount\n1,01/01,+1\n2,02/02,-2\n".as_bytes());
            let report = engine(2, 1, Arc::new(FailingStore))
                .process_file(1, &mut source)
                .await
                .unwrap();

            assert_eq!(report.error_count, 2);
            assert_eq!(report.count_credit, 0);
            assert_eq!(report.count_debit, 0);
            assert!(report.transactions_by_month.is_empty());
        }

        #[tokio::test]
        async fn test_cancelled_inserts_are_row_errors() {
            let cancel = CancellationToken::new();
            cancel.cancel();

            let store = Arc::new(MemoryStore::new());
            let mut source = CsvRowSource::new("id,date,amount\n1,01/01,+1\n2,02/02,-2\nx,1,1\n".as_bytes());
            let report = engine(3, 2, store.clone())
                .with_cancellation(cancel)
                .process_file(1, &mut source)
                .await
                .unwrap();

            assert_eq!(report.error_count, 3);
            assert_eq!(report.count_credit + report.count_debit, 0);
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn test_in_memory_rows() {
            let mut source = vec![
                RawRow::new("id", "date", "amount"),
                RawRow::new("1", "03/03", "+5"),
                RawRow::new("2", "03/04", "-2.5"),
            ]
            .into_iter();
            let report = engine(2, 8, Arc::new(MemoryStore::new()))
                .process_file(4, &mut source)
                .await
                .unwrap();

            assert_eq!(report.total_balance, dec("2.5"));
            assert_eq!(report.transactions_by_month, BTreeMap::from([(3, 2)]));
        }
    
        #[tokio::test]
        async fn test_overflowing_row_is_a_row_error() {
            let store = Arc::new(MemoryStore::new());
            let content = "id,date,amount\n1,01/01,+79228162514264337593543950335\n2,01/02,+1\n";
            let mut source = CsvRowSource::new(content.as_bytes());
            let report = engine(1, 1, store.clone())
                .process_file(1, &mut source)
                .await
                .unwrap();

            assert_eq!(report.count_credit, 1);
            assert_eq!(report.total_credit, Decimal::MAX);
            assert_eq!(report.error_count, 1);
            assert_eq!(report.transactions_by_month, BTreeMap::from([(1, 1)]));
            assert_eq!(store.len(), 1);
        }

        #[tokio::test]
        async fn test_rounding_row_is_a_row_error() {
            let store = Arc::new(MemoryStore::new());
            let content = "id,date,amount\n1,01/01,+1.0000000000000000000000000001\n2,01/02,+10\n";
            let mut source = CsvRowSource::new(content.as_bytes());
            let report = engine(1, 1, store.clone())
                .process_file(1, &mut source)
                .await
                .unwrap();

            assert_eq!(report.count_credit, 1);
            assert_eq!(report.total_credit, dec("1.0000000000000000000000000001"));
            assert_eq!(report.error_count, 1);
            assert_eq!(store.len(), 1);
        }

        #[tokio::test]
        async fn test_overflowing_merge_is_an_error() {
            // Each worker holds one row until both rows are taken, so the
            // two maximal credits land in different partial reports.
            let store = Arc::new(GatedStore {
                gate: tokio::sync::Barrier::new(2),
            });
            let content = "id,date,amount\n1,01/01,+79228162514264337593543950335\n2,01/02,+79228162514264337593543950335\n";
            let mut source = CsvRowSource::new(content.as_bytes());
            let result = engine(2, 1, store).process_file(1, &mut source).await;

            assert!(matches!(
                result,
                Err(PipelineError::Accounting(AccountingError::Overflow { .. }))
            ));
        }
    }
}
