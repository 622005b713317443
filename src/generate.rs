//! Random transaction files in the `id,MM/DD,±amount` shape the pipeline reads.

use crate::error::GenerateError;

use chrono::{Duration, NaiveDate};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::io::Write;

pub const HEADER: [&str; 3] = ["id", "date", "amount"];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub count: u64,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub amount_min: Decimal,
    pub amount_max: Decimal,
}

impl GeneratorConfig {
    /// Amount bounds in whole cents, rounded inward.
    fn cent_range(&self) -> Result<(i64, i64), GenerateError> {
        let invalid = || GenerateError::InvalidAmountRange {
            min: self.amount_min,
            max: self.amount_max,
        };

        if self.amount_min.is_sign_negative() {
            return Err(invalid());
        }

        let min = (self.amount_min * Decimal::ONE_HUNDRED).ceil().to_i64().ok_or_else(invalid)?;
        let max = (self.amount_max * Decimal::ONE_HUNDRED).floor().to_i64().ok_or_else(invalid)?;
        if min > max {
            return Err(invalid());
        }

        Ok((min, max))
    }

    fn day_span(&self) -> Result<i64, GenerateError> {
        if self.date_min > self.date_max {
            return Err(GenerateError::InvalidDateRange {
                min: self.date_min,
                max: self.date_max,
            });
        }
        Ok((self.date_max - self.date_min).num_days())
    }
}

/// Writes a header and `config.count` rows drawn from `rng`.
///
/// Credits and debits are equally likely; amounts carry two decimals.
pub fn write_transactions<W: Write, R: Rng>(
    config: &GeneratorConfig,
    rng: &mut R,
    writer: W,
) -> Result<u64, GenerateError> {
    let (min_cents, max_cents) = config.cent_range()?;
    let days = config.day_span()?;

    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(HEADER)?;

    for id in 0..config.count {
        let date = config.date_min + Duration::days(rng.gen_range(0..=days));
        let amount = Decimal::new(rng.gen_range(min_cents..=max_cents), 2);
        let sign = if rng.gen_bool(0.5) { '+' } else { '-' };

        writer.write_record([
            id.to_string(),
            date.format("%m/%d").to_string(),
            format!("{}{}", sign, amount),
        ])?;
    }

    writer.flush()?;
    Ok(config.count)
}
