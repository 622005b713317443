use crate::error::ValidationError;

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::Serialize;

/// One data row exactly as it was read: `(id, date, signed_amount)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub id: String,
    pub date: String,
    pub amount: String,
}

impl RawRow {
    pub fn new(id: &str, date: &str, amount: &str) -> Self {
        Self {
            id: id.to_string(),
            date: date.to_string(),
            amount: amount.to_string(),
        }
    }
}

impl From<&StringRecord> for RawRow {
    // Missing fields become empty strings and fail validation later on.
    fn from(record: &StringRecord) -> Self {
        let field = |i: usize| record.get(i).unwrap_or_default().to_string();
        Self {
            id: field(0),
            date: field(1),
            amount: field(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Credit,
    Debit,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Credit => "credit",
            Operation::Debit => "debit",
        }
    }
}

/// The typed content of a row that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub performed_at: NaiveDate,
    pub operation: Operation,
    pub amount: Decimal,
}

impl RawRow {
    /// Applies the row rules in order: id, date, then signed amount.
    ///
    /// The source only carries month and day, so the date is anchored to
    /// `year`. The first failing rule wins and nothing else is parsed.
    pub fn validate(&self, year: i32) -> Result<ParsedRecord, ValidationError> {
        validate_id(&self.id)?;
        let performed_at = parse_date(&self.date, year)?;
        let (operation, amount) = parse_signed_amount(&self.amount)?;

        Ok(ParsedRecord {
            performed_at,
            operation,
            amount,
        })
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if !all_digits(id) {
        return Err(ValidationError::InvalidId(id.to_string()));
    }
    Ok(())
}

pub fn parse_date(date: &str, year: i32) -> Result<NaiveDate, ValidationError> {
    let (month, day) = match date.split_once('/') {
        Some((m, d)) if m.len() == 2 && d.len() == 2 && all_digits(m) && all_digits(d) => (m, d),
        _ => return Err(ValidationError::InvalidDate(date.to_string())),
    };

    // Both halves are exactly two ASCII digits here.
    let month: u32 = month
        .parse()
        .map_err(|_| ValidationError::InvalidDate(date.to_string()))?;
    let day: u32 = day
        .parse()
        .map_err(|_| ValidationError::InvalidDate(date.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| ValidationError::InvalidCalendarDay {
        value: date.to_string(),
        year,
    })
}

pub fn parse_signed_amount(raw: &str) -> Result<(Operation, Decimal), ValidationError> {
    let invalid = || ValidationError::InvalidAmount(raw.to_string());

    let operation = match raw.as_bytes().first() {
        Some(b'+') => Operation::Credit,
        Some(b'-') => Operation::Debit,
        _ => return Err(invalid()),
    };

    let body = &raw[1..];
    let well_formed = match body.split_once('.') {
        Some((whole, fraction)) => all_digits(whole) && all_digits(fraction),
        None => all_digits(body),
    };
    if !well_formed {
        return Err(invalid());
    }

    let amount = Decimal::from_str_exact(body)
        .map_err(|_| ValidationError::UnrepresentableAmount(raw.to_string()))?;

    Ok((operation, amount))
}
