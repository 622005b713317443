use crate::report::BalanceReport;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Balance snapshot kept for an account after each processed file.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub account_id: i64,
    pub total_balance: Option<Decimal>,
    pub avg_debit_amount: Option<Decimal>,
    pub avg_credit_amount: Option<Decimal>,
    pub last_balance_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(account_id: i64) -> Self {
        Self {
            account_id,
            total_balance: None,
            avg_debit_amount: None,
            avg_credit_amount: None,
            last_balance_at: None,
        }
    }

    pub fn has_balance(&self) -> bool {
        self.last_balance_at.is_some()
    }

    /// Replaces the snapshot with the figures of `report`.
    ///
    /// Returns `false` and leaves the account untouched when the report
    /// belongs to another account.
    pub fn apply_report(&mut self, report: &BalanceReport, at: DateTime<Utc>) -> bool {
        if report.account_id != self.account_id {
            return false;
        }

        self.total_balance = Some(report.total_balance);
        self.avg_debit_amount = Some(report.avg_debit_amount);
        self.avg_credit_amount = Some(report.avg_credit_amount);
        self.last_balance_at = Some(at);

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{PartialReport, ReportMerger};

    fn report(account_id: i64) -> BalanceReport {
        let mut partial = PartialReport::new();
        partial.total_credit = Decimal::from(30);
        partial.count_credit = 2;
        partial.total_debit = Decimal::from(5);
        partial.count_debit = 1;

        let mut merger = ReportMerger::new(account_id);
        merger.merge(&partial).unwrap();
        merger.finish().unwrap()
    }

    #[test]
    fn test_apply_report() {
        let mut account = Account::new(7);
        assert!(!account.has_balance());

        let now = Utc::now();
        assert!(account.apply_report(&report(7), now));

        assert!(account.has_balance());
        assert_eq!(account.total_balance, Some(Decimal::from(25)));
        assert_eq!(account.avg_credit_amount, Some(Decimal::from(15)));
        assert_eq!(account.avg_debit_amount, Some(Decimal::from(5)));
        assert_eq!(account.last_balance_at, Some(now));
    }

    #[test]
    fn test_apply_report_of_other_account() {
        let mut account = Account::new(7);

        assert!(!account.apply_report(&report(8), Utc::now()));
        assert!(!account.has_balance());
        assert_eq!(account.total_balance, None);
    }
}
