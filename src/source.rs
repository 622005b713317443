use crate::error::SourceError;
use crate::transaction::RawRow;

use csv::{ErrorKind, ReaderBuilder, StringRecord};
use std::io::Read;
use tracing::warn;

/// A header followed by a finite, one-shot sequence of rows.
pub trait RowSource {
    /// Reads and discards the header row.
    fn read_header(&mut self) -> Result<(), SourceError>;

    /// `Ok(None)` marks the end of input.
    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError>;
}

pub struct CsvRowSource<R> {
    reader: csv::Reader<R>,
    record: StringRecord,
}

impl<R: Read> CsvRowSource<R> {
    pub fn new(input: R) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(input);

        Self {
            reader,
            record: StringRecord::new(),
        }
    }
}

impl<R: Read> RowSource for CsvRowSource<R> {
    fn read_header(&mut self) -> Result<(), SourceError> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Ok(()),
            Ok(false) => Err(SourceError::MissingHeader),
            Err(e) => Err(SourceError::Header(e)),
        }
    }

    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => Ok(Some(RawRow::from(&self.record))),
            Ok(false) => Ok(None),
            // A row with the wrong number of fields ends the input.
            Err(e) if matches!(e.kind(), ErrorKind::UnequalLengths { .. }) => {
                warn!(error = %e, "stopping at row with unexpected field count");
                Ok(None)
            }
            Err(e) => Err(SourceError::Malformed(e)),
        }
    }
}

/// In-memory rows, handy when the caller already holds parsed fields.
impl RowSource for std::vec::IntoIter<RawRow> {
    fn read_header(&mut self) -> Result<(), SourceError> {
        self.next().map(|_| ()).ok_or(SourceError::MissingHeader)
    }

    fn next_row(&mut self) -> Result<Option<RawRow>, SourceError> {
        Ok(self.next())
    }
}
