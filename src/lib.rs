pub mod account;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod report;
pub mod source;
pub mod store;
pub mod transaction;

use crate::source::CsvRowSource;
use std::fs::File;
use std::path::Path;

/// Opens a transaction CSV on disk as a row source. The header is left for
/// the pipeline to consume.
pub fn open_rows<P: AsRef<Path>>(path: P) -> std::io::Result<CsvRowSource<File>> {
    let file = File::open(path)?;
    Ok(CsvRowSource::new(file))
}
