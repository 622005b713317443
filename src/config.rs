use crate::error::ConfigError;

use chrono::{Datelike, Local};

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Sizing of the ingestion pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    workers: usize,
    batch_size: usize,
    year: i32,
}

impl PipelineConfig {
    pub fn new(workers: usize, batch_size: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if batch_size == 0 {
            return Err(ConfigError::EmptyBatch);
        }

        Ok(Self {
            workers,
            batch_size,
            year: Local::now().year(),
        })
    }

    /// Anchors month/day rows to `year` instead of the current one.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            year: Local::now().year(),
        }
    }
}
