use crate::transaction::{Operation, ParsedRecord};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// A validated transaction ready to be inserted for an account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub account_id: i64,
    pub operation: Operation,
    pub amount: Decimal,
    pub performed_at: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Stamps both timestamps with `now`; they are never touched again.
    pub fn from_record(account_id: i64, record: ParsedRecord, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            operation: record.operation,
            amount: record.amount,
            performed_at: record.performed_at,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.operation == Operation::Credit
    }
}
