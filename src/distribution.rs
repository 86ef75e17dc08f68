//! Splitting the iteration range across workers.
//!
//! A [`DistributionPolicy`] turns `(num_iterations, num_workers)` into an
//! ordered list of contiguous [`Block`]s that cover `[0, num_iterations)`
//! with no gap and no overlap. Rounding remainders always land in the last
//! worker's block.
//!
//! Two policies exist:
//!
//! - **Uniform**: every block has `ceil(N / workers)` iterations except the
//!   last, which is clamped to `N`.
//! - **Weighted**: block sizes follow a [`WorkRates`] table of measured
//!   relative work rates, so workers whose iterations are cheaper receive
//!   more of them.
//!
//! # Example
//!
//! ```
//! use pidecimals::{Block, DistributionPolicy};
//!
//! let blocks = DistributionPolicy::Uniform.partition(10, 4);
//! assert_eq!(
//!     blocks,
//!     vec![Block::new(0, 3), Block::new(3, 6), Block::new(6, 9), Block::new(9, 10)]
//! );
//! ```

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Work-rate table bundled with the crate.
pub const BUILTIN_WORK_RATES: &str = include_str!("../resources/work_rates.toml");

/// Table format version this crate understands.
pub const WORK_RATES_VERSION: u32 = 1;

/// Largest deviation of a column's sum from 100 accepted on load.
const RATE_SUM_TOLERANCE: f64 = 0.5;

/// A contiguous range `[start, end)` of term indices assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    /// First index of the block
    pub start: u64,
    /// One past the last index of the block
    pub end: u64,
}

impl Block {
    /// Create a block. `start` must not exceed `end`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "block start {start} past end {end}");
        Block { start, end }
    }

    /// Number of indices in the block.
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the block holds no index.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The indices of the block, in increasing order.
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

// ============================================================================
// Work-rate tables
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RatesFile {
    version: u32,
    #[serde(default)]
    column: Vec<RateColumn>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RateColumn {
    workers: usize,
    rates: Vec<f64>,
}

/// Measured relative work rates, one column per worker count.
///
/// `column(w)[i]` is the percentage of the iteration range worker `i` gets
/// when `w` workers share it.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRates {
    version: u32,
    columns: BTreeMap<usize, Vec<f64>>,
}

impl WorkRates {
    /// The table bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN_WORK_RATES)
    }

    /// Load a table from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Parse and validate a TOML table.
    ///
    /// # Errors
    ///
    /// [`Error::Toml`] for malformed TOML and [`Error::InvalidWorkRates`]
    /// for an unknown version, duplicate columns, a column whose length
    /// differs from its worker count, negative rates, or a sum away from 100.
    pub fn parse(text: &str) -> Result<Self> {
        let file: RatesFile = toml::from_str(text)?;
        if file.version != WORK_RATES_VERSION {
            return Err(Error::InvalidWorkRates(format!(
                "unsupported version {} (expected {WORK_RATES_VERSION})",
                file.version
            )));
        }
        let mut columns = BTreeMap::new();
        for column in file.column {
            validate_column(&column)?;
            if columns.insert(column.workers, column.rates).is_some() {
                return Err(Error::InvalidWorkRates(format!(
                    "duplicate column for {} workers",
                    column.workers
                )));
            }
        }
        Ok(WorkRates {
            version: file.version,
            columns,
        })
    }

    /// Table format version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Rates for `workers` workers, if the table was measured for that count.
    pub fn column(&self, workers: usize) -> Option<&[f64]> {
        self.columns.get(&workers).map(Vec::as_slice)
    }

    /// Worker counts the table covers, ascending.
    pub fn worker_counts(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.keys().copied()
    }
}

fn validate_column(column: &RateColumn) -> Result<()> {
    if column.workers == 0 {
        return Err(Error::InvalidWorkRates("column for zero workers".into()));
    }
    if column.rates.len() != column.workers {
        return Err(Error::InvalidWorkRates(format!(
            "column for {} workers has {} rates",
            column.workers,
            column.rates.len()
        )));
    }
    if let Some(bad) = column.rates.iter().find(|r| !r.is_finite() || **r < 0.0) {
        return Err(Error::InvalidWorkRates(format!(
            "column for {} workers has invalid rate {bad}",
            column.workers
        )));
    }
    let sum: f64 = column.rates.iter().sum();
    if (sum - 100.0).abs() > RATE_SUM_TOLERANCE {
        return Err(Error::InvalidWorkRates(format!(
            "column for {} workers sums to {sum:.2}, expected 100",
            column.workers
        )));
    }
    Ok(())
}

// ============================================================================
// Policies
// ============================================================================

/// How a formula's iteration range is split across workers.
#[derive(Debug, Clone, PartialEq)]
pub enum DistributionPolicy {
    /// Equal-sized blocks
    Uniform,
    /// Blocks sized by measured work rates
    Weighted(WorkRates),
}

impl DistributionPolicy {
    /// Partition `[0, iterations)` into `workers` contiguous blocks, ordered
    /// by worker id.
    ///
    /// Blocks of workers past the end of the range are empty and sit at
    /// `iterations`. With a single worker the whole range is returned
    /// without consulting any table.
    pub fn partition(&self, iterations: u64, workers: usize) -> Vec<Block> {
        if workers == 0 {
            return Vec::new();
        }
        if workers == 1 {
            return vec![Block::new(0, iterations)];
        }
        match self {
            DistributionPolicy::Uniform => uniform(iterations, workers),
            DistributionPolicy::Weighted(rates) => match rates.column(workers) {
                Some(column) => weighted(iterations, column),
                None => {
                    warn!(
                        "No work rates measured for {workers} workers (table covers {:?}); \
                         falling back to uniform blocks",
                        rates.worker_counts().collect::<Vec<_>>()
                    );
                    uniform(iterations, workers)
                }
            },
        }
    }
}

fn uniform(iterations: u64, workers: usize) -> Vec<Block> {
    let size = iterations.div_ceil(workers as u64);
    (0..workers as u64)
        .map(|id| {
            let start = (id * size).min(iterations);
            let end = if id + 1 == workers as u64 {
                iterations
            } else {
                (start + size).min(iterations)
            };
            Block::new(start, end)
        })
        .collect()
}

fn weighted(iterations: u64, rates: &[f64]) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(rates.len());
    let mut start = 0u64;
    for (id, rate) in rates.iter().enumerate() {
        let end = if id + 1 == rates.len() {
            iterations
        } else {
            let size = (rate * iterations as f64 / 100.0).floor() as u64;
            (start + size).min(iterations)
        };
        blocks.push(Block::new(start, end));
        start = end;
    }
    blocks
}
