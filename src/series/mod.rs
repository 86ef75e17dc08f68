//! Recurrence engines for the three pi series.
//!
//! Each series is a [`Recurrence`]: a small state that yields the term at
//! index `n` and is then advanced to `n + 1` with a constant number of
//! big-value operations. A worker never replays the iterations before its
//! block; [`Recurrence::seed`] rebuilds the state at the block start from a
//! closed form.
//!
//! [`sum_block`] is the single block runner shared by the sequential,
//! threaded and multi-process drivers.

use std::fmt;
use std::str::FromStr;

use log::trace;

use crate::big::BigValue;
use crate::distribution::{Block, DistributionPolicy, WorkRates};
use crate::error::{Error, Result};
use crate::precision::Precision;

pub mod bbp;
pub mod bellard;
pub mod chudnovsky;

pub use bbp::Bbp;
pub use bellard::Bellard;
pub use chudnovsky::Chudnovsky;

/// Largest supported term index. Keeps `6n` and every other factorial
/// argument within `u32`.
pub const MAX_ITERATIONS: u64 = (u32::MAX / 6) as u64;

/// Validate a seeding index and narrow it for factorials and powers.
pub(crate) fn seed_index(start: u64) -> Result<u32> {
    if start > MAX_ITERATIONS {
        return Err(Error::TooManyIterations {
            requested: start,
            max: MAX_ITERATIONS,
        });
    }
    u32::try_from(start).map_err(|_| Error::TooManyIterations {
        requested: start,
        max: MAX_ITERATIONS,
    })
}

/// A pi series expressed as an incremental recurrence.
///
/// The contract between the methods:
///
/// - `seed(k)` returns exactly the state a run starting at `seed(0)` holds
///   after `k` calls to `step`.
/// - `term(state, n)` is the contribution of index `n`, given the state for
///   index `n`.
/// - `close` is applied once, to the fully reduced sum.
pub trait Recurrence: Sync {
    /// Per-worker state, owned by the worker running a block.
    type State: Send;

    /// Human-readable series name.
    const NAME: &'static str;

    /// Precision every value of this engine is created at.
    fn precision(&self) -> Precision;

    /// State at index `start`, built without iterating from zero.
    ///
    /// Fails with [`Error::TooManyIterations`] past [`MAX_ITERATIONS`].
    fn seed(&self, start: u64) -> Result<Self::State>;

    /// Contribution of index `n`.
    fn term(&self, state: &Self::State, n: u64) -> BigValue;

    /// Advance `state` from index `n` to `n + 1`.
    fn step(&self, state: &mut Self::State, n: u64);

    /// Turn the reduced series sum into pi.
    fn close(&self, sum: BigValue) -> Result<BigValue>;
}

/// Partial sum of the terms in `block`, in increasing index order.
///
/// An empty block sums to zero and seeds nothing.
pub fn sum_block<R: Recurrence>(engine: &R, block: Block) -> Result<BigValue> {
    let mut partial = BigValue::zero(engine.precision());
    if block.is_empty() {
        return Ok(partial);
    }
    trace!("{}: seeding block {block}", R::NAME);
    let mut state = engine.seed(block.start)?;
    for n in block.range() {
        partial.add_assign(&engine.term(&state, n));
        engine.step(&mut state, n);
    }
    Ok(partial)
}

/// `numerator / denominator` at the given precision.
pub(crate) fn unit_fraction(precision: Precision, numerator: u64, denominator: u64) -> BigValue {
    let mut value = BigValue::from_u64(precision, numerator);
    value.div_u64(denominator);
    value
}

// ============================================================================
// Algorithm selection
// ============================================================================

/// The series a computation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Bailey-Borwein-Plouffe, about 1.2 decimals per term
    Bbp,
    /// Bellard, about 3 decimals per term
    Bellard,
    /// Chudnovsky, about 14 decimals per term
    Chudnovsky,
}

impl Algorithm {
    /// Every algorithm, in id order.
    pub const ALL: [Algorithm; 3] = [Algorithm::Bbp, Algorithm::Bellard, Algorithm::Chudnovsky];

    /// Numeric id accepted on the command line.
    pub fn id(self) -> u8 {
        match self {
            Algorithm::Bbp => 0,
            Algorithm::Bellard => 1,
            Algorithm::Chudnovsky => 2,
        }
    }

    /// Lower-case name accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Bbp => "bbp",
            Algorithm::Bellard => "bellard",
            Algorithm::Chudnovsky => "chudnovsky",
        }
    }

    /// Iterations needed for `digits` correct decimals.
    pub fn iterations_for_digits(self, digits: u64) -> u64 {
        match self {
            // 0.84 * digits, floored, in integer arithmetic
            Algorithm::Bbp => digits * 84 / 100,
            Algorithm::Bellard => digits / 3,
            Algorithm::Chudnovsky => digits.div_ceil(14),
        }
    }

    /// Distribution policy for this series.
    ///
    /// Chudnovsky terms get more expensive as `n` grows, so its blocks follow
    /// the measured work rates. The other series have constant-cost terms and
    /// split uniformly.
    pub fn policy(self, rates: &WorkRates) -> DistributionPolicy {
        match self {
            Algorithm::Chudnovsky => DistributionPolicy::Weighted(rates.clone()),
            Algorithm::Bbp | Algorithm::Bellard => DistributionPolicy::Uniform,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Bbp => Bbp::NAME,
            Algorithm::Bellard => Bellard::NAME,
            Algorithm::Chudnovsky => Chudnovsky::NAME,
        })
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name() == wanted || a.id().to_string() == wanted)
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_string()))
    }
}
