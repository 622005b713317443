//! Per-worker partial reports and the merged balance report.

use crate::engine::transaction::Transaction;
use crate::error::AccountingError;

use chrono::{Datelike, Month};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// `total + amount`, refused when it overflows or would round away digits.
pub fn exact_add(total: Decimal, amount: Decimal) -> Result<Decimal, AccountingError> {
    let sum = total
        .checked_add(amount)
        .ok_or(AccountingError::Overflow { total, amount })?;

    // Both operands are multiples of 10^-needed, so any sum kept at that
    // scale or finer is exact. A coarser one was rounded to fit 96 bits.
    let needed = total.normalize().scale().max(amount.normalize().scale());
    if sum.scale() < needed {
        return Err(AccountingError::PrecisionLoss { total, amount });
    }

    Ok(sum)
}

/// What one worker accumulates over the rows it consumed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialReport {
    pub total_credit: Decimal,
    pub total_debit: Decimal,
    pub count_credit: u64,
    pub count_debit: u64,
    pub transactions_by_month: BTreeMap<u32, u64>,
    pub error_count: u64,
}

impl PartialReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts `tx`. On error nothing is changed.
    pub fn record(&mut self, tx: &Transaction) -> Result<(), AccountingError> {
        if tx.is_credit() {
            self.total_credit = exact_add(self.total_credit, tx.amount)?;
            self.count_credit += 1;
        } else {
            self.total_debit = exact_add(self.total_debit, tx.amount)?;
            self.count_debit += 1;
        }

        *self
            .transactions_by_month
            .entry(tx.performed_at.month())
            .or_insert(0) += 1;

        Ok(())
    }

    /// Undoes a successful [`record`](Self::record) of the same transaction.
    pub fn revert(&mut self, tx: &Transaction) {
        // The sum held `tx.amount` exactly, so taking it back is exact too.
        if tx.is_credit() {
            self.total_credit -= tx.amount;
            self.count_credit -= 1;
        } else {
            self.total_debit -= tx.amount;
            self.count_debit -= 1;
        }

        let month = tx.performed_at.month();
        if let Some(count) = self.transactions_by_month.get_mut(&month) {
            *count -= 1;
            if *count == 0 {
                self.transactions_by_month.remove(&month);
            }
        }
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
    }

    /// Adds `other` into `self`. Order of merging never changes the result.
    ///
    /// On error `self` is left as it was.
    pub fn merge(&mut self, other: &PartialReport) -> Result<(), AccountingError> {
        let total_credit = exact_add(self.total_credit, other.total_credit)?;
        let total_debit = exact_add(self.total_debit, other.total_debit)?;

        self.total_credit = total_credit;
        self.total_debit = total_debit;
        self.count_credit += other.count_credit;
        self.count_debit += other.count_debit;
        self.error_count += other.error_count;

        for (month, count) in &other.transactions_by_month {
            *self.transactions_by_month.entry(*month).or_insert(0) += count;
        }

        Ok(())
    }

    pub fn rows_seen(&self) -> u64 {
        self.count_credit + self.count_debit + self.error_count
    }
}

/// Final aggregate for one account, built once by [`ReportMerger::finish`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceReport {
    pub account_id: i64,
    pub total_credit: Decimal,
    pub count_credit: u64,
    pub total_debit: Decimal,
    pub count_debit: u64,
    pub total_balance: Decimal,
    pub avg_debit_amount: Decimal,
    pub avg_credit_amount: Decimal,
    #[serde(rename = "transaction_count")]
    pub transactions_by_month: BTreeMap<u32, u64>,
    pub error_count: u64,
}

/// Running fan-in accumulator for one account.
#[derive(Debug)]
pub struct ReportMerger {
    account_id: i64,
    merged: PartialReport,
}

impl ReportMerger {
    pub fn new(account_id: i64) -> Self {
        Self {
            account_id,
            merged: PartialReport::new(),
        }
    }

    pub fn merge(&mut self, partial: &PartialReport) -> Result<(), AccountingError> {
        self.merged.merge(partial)
    }

    /// Derives balance and averages from the fully merged sums.
    pub fn finish(self) -> Result<BalanceReport, AccountingError> {
        let merged = self.merged;

        Ok(BalanceReport {
            account_id: self.account_id,
            total_balance: exact_add(merged.total_credit, -merged.total_debit)?,
            avg_credit_amount: average(merged.total_credit, merged.count_credit),
            avg_debit_amount: average(merged.total_debit, merged.count_debit),
            total_credit: merged.total_credit,
            count_credit: merged.count_credit,
            total_debit: merged.total_debit,
            count_debit: merged.count_debit,
            transactions_by_month: merged.transactions_by_month,
            error_count: merged.error_count,
        })
    }
}

// Division is the one place rounding is expected: 28 significant digits.
fn average(total: Decimal, count: u64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    total / Decimal::from(count)
}

/// `$` followed by the amount rounded half-to-even to two places.
pub fn money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
    rounded.rescale(2);
    format!("${}", rounded)
}

/// English month name for a histogram key, or `None` for anything outside 1..=12.
pub fn month_name(month: u32) -> Option<&'static str> {
    let month = u8::try_from(month).ok()?;
    Month::try_from(month).ok().map(|m| m.name())
}

impl BalanceReport {
    pub fn dump_summary<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Account {}", self.account_id)?;
        writeln!(writer, "Total balance: {}", money(self.total_balance))?;
        writeln!(
            writer,
            "Credits: {} ({} transactions, average {})",
            money(self.total_credit),
            self.count_credit,
            money(self.avg_credit_amount)
        )?;
        writeln!(
            writer,
            "Debits: {} ({} transactions, average {})",
            money(self.total_debit),
            self.count_debit,
            money(self.avg_debit_amount)
        )?;

        for (month, count) in &self.transactions_by_month {
            match month_name(*month) {
                Some(name) => writeln!(writer, "Transactions in {}: {}", name, count)?,
                None => writeln!(writer, "Transactions in month {}: {}", month, count)?,
            }
        }

        if self.error_count > 0 {
            writeln!(writer, "Rejected rows: {}", self.error_count)?;
        }

        Ok(())
    }
}
