//! Computation entry points.
//!
//! A [`RunConfig`] carries everything one computation needs. [`compute`]
//! runs it on any [`Communicator`]: the global iteration range is split into
//! `threads × size` blocks, rank `r` takes blocks `r·threads .. (r+1)·threads`
//! and sums them on its [`Team`], and the per-rank sums are reduced to the
//! root, which alone applies the closing transform.

use log::{debug, info};

use crate::ReduceOp;
use crate::big::BigValue;
use crate::comm::{Communicator, ROOT, SelfComm};
use crate::distribution::{Block, WorkRates};
use crate::error::{Error, Result};
use crate::precision::Precision;
use crate::series::{Algorithm, Bbp, Bellard, Chudnovsky, MAX_ITERATIONS, Recurrence};
use crate::team::Team;

/// Mantissa bits requested per decimal digit.
pub const BITS_PER_DIGIT: u64 = 8;

/// A request for a number of correct decimals, turned into precision and
/// iteration count by per-algorithm heuristics.
///
/// # Example
///
/// ```
/// use pidecimals::{Algorithm, DigitsRequest};
///
/// let request = DigitsRequest::new(Algorithm::Bellard, 300);
/// assert_eq!(request.precision_bits(), 2400);
/// assert_eq!(request.iterations(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitsRequest {
    /// Series to run
    pub algorithm: Algorithm,
    /// Requested decimal digits
    pub digits: u64,
}

impl DigitsRequest {
    /// Request `digits` decimals with `algorithm`.
    pub fn new(algorithm: Algorithm, digits: u64) -> Self {
        DigitsRequest { algorithm, digits }
    }

    /// Mantissa precision in bits.
    pub fn precision_bits(&self) -> u64 {
        self.digits.saturating_mul(BITS_PER_DIGIT)
    }

    /// Number of series terms.
    pub fn iterations(&self) -> u64 {
        self.algorithm.iterations_for_digits(self.digits)
    }
}

/// Configuration of one computation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Series to run
    pub algorithm: Algorithm,
    /// Precision of every value in the computation
    pub precision: Precision,
    /// Number of series terms, `[0, iterations)`
    pub iterations: u64,
    /// Threads per process
    pub threads: usize,
    /// Table used by the weighted distribution policy
    pub work_rates: WorkRates,
}

impl RunConfig {
    /// Validate a configuration using the bundled work-rate table.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPrecision`] / [`Error::PrecisionTooLarge`],
    /// [`Error::NoThreads`], and [`Error::TooManyIterations`] beyond
    /// [`MAX_ITERATIONS`].
    pub fn new(
        algorithm: Algorithm,
        precision_bits: u64,
        iterations: u64,
        threads: usize,
    ) -> Result<Self> {
        let precision = Precision::new(precision_bits)?;
        if threads == 0 {
            return Err(Error::NoThreads);
        }
        if iterations > MAX_ITERATIONS {
            return Err(Error::TooManyIterations {
                requested: iterations,
                max: MAX_ITERATIONS,
            });
        }
        Ok(RunConfig {
            algorithm,
            precision,
            iterations,
            threads,
            work_rates: WorkRates::builtin()?,
        })
    }

    /// Configuration for a [`DigitsRequest`].
    pub fn from_digits(request: DigitsRequest, threads: usize) -> Result<Self> {
        Self::new(
            request.algorithm,
            request.precision_bits(),
            request.iterations(),
            threads,
        )
    }

    /// Replace the work-rate table.
    pub fn with_work_rates(mut self, work_rates: WorkRates) -> Self {
        self.work_rates = work_rates;
        self
    }

    /// Total number of workers in a world of `processes` ranks.
    pub fn workers(&self, processes: usize) -> usize {
        self.threads * processes
    }

    /// Check that every one of `threads × processes` workers gets at least
    /// one iteration.
    ///
    /// The computation itself accepts empty blocks; this is the check the
    /// command line applies before starting.
    pub fn check_workers(&self, processes: usize) -> Result<()> {
        if processes == 0 {
            return Err(Error::NoProcesses);
        }
        let workers = self.workers(processes);
        if self.iterations < workers as u64 {
            return Err(Error::InsufficientIterations {
                iterations: self.iterations,
                workers,
            });
        }
        Ok(())
    }

    /// Blocks assigned to the threads of `rank` in a world of `size`.
    pub fn blocks_for_rank(&self, rank: usize, size: usize) -> Vec<Block> {
        let policy = self.algorithm.policy(&self.work_rates);
        let blocks = policy.partition(self.iterations, self.workers(size));
        let first = (rank * self.threads).min(blocks.len());
        let last = ((rank + 1) * self.threads).min(blocks.len());
        blocks[first..last].to_vec()
    }
}

/// Run a computation on `comm`.
///
/// Every rank of the world must call this with the same configuration.
/// The root returns `Some(pi)`; every other rank returns `None`.
///
/// # Errors
///
/// Thread-pool and transport errors, and [`Error::DivisionByZero`] when the
/// Chudnovsky sum is zero (no iterations).
pub fn compute<C: Communicator>(comm: &C, config: &RunConfig) -> Result<Option<BigValue>> {
    match config.algorithm {
        Algorithm::Bbp => run(comm, &Bbp::new(config.precision), config),
        Algorithm::Bellard => run(comm, &Bellard::new(config.precision), config),
        Algorithm::Chudnovsky => run(comm, &Chudnovsky::new(config.precision), config),
    }
}

/// Run a computation in this process only.
pub fn compute_local(config: &RunConfig) -> Result<BigValue> {
    compute(&SelfComm, config)?
        .ok_or_else(|| Error::Transport("a single-process world produced no result".into()))
}

/// Compute pi with `workers` threads in this process.
///
/// # Example
///
/// ```
/// use pidecimals::{compute_pi, matching_decimals, Algorithm, PI_REFERENCE};
///
/// let pi = compute_pi(Algorithm::Chudnovsky, 512, 10, 2).unwrap();
/// assert!(matching_decimals(&pi, PI_REFERENCE) >= 130);
/// ```
pub fn compute_pi(
    algorithm: Algorithm,
    precision_bits: u64,
    iterations: u64,
    workers: usize,
) -> Result<BigValue> {
    compute_local(&RunConfig::new(algorithm, precision_bits, iterations, workers)?)
}

fn run<C, R>(comm: &C, engine: &R, config: &RunConfig) -> Result<Option<BigValue>>
where
    C: Communicator,
    R: Recurrence,
{
    let (rank, size) = (comm.rank(), comm.size());
    if comm.is_root() {
        info!(
            "{}: {} iterations at {} on {size} process(es) x {} thread(s)",
            R::NAME,
            config.iterations,
            config.precision,
            config.threads
        );
    }
    let blocks = config.blocks_for_rank(rank, size);
    debug!(
        "rank {rank}: blocks {}",
        blocks
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );

    let team = Team::new(config.threads)?;
    let local = team.sum_blocks(engine, &blocks)?;

    match comm.reduce(&local, config.precision, ReduceOp::Sum, ROOT)? {
        Some(sum) => engine.close(sum).map(Some),
        None => Ok(None),
    }
}
