//! # pidecimals
//!
//! Decimals of pi from three series, each runnable sequentially, on a pool
//! of threads, and across several processes.
//!
//! | Series | Decimals per term | Closing transform |
//! |--------|-------------------|-------------------|
//! | [`Bbp`] (Bailey-Borwein-Plouffe) | ~1.2 | none |
//! | [`Bellard`] | ~3 | divide by 64 |
//! | [`Chudnovsky`] | ~14 | `426880·sqrt(10005) / sum` |
//!
//! Every series is a [`Recurrence`]: each term is derived from the previous
//! one with a constant number of big-value operations, and a worker starting
//! in the middle of the range rebuilds its state from a closed form instead
//! of replaying the earlier terms.
//!
//! ## Quick Start
//!
//! ```
//! use pidecimals::{
//!     Algorithm, DigitsRequest, PI_REFERENCE, RunConfig, compute_local, matching_decimals,
//! };
//!
//! fn main() -> Result<(), pidecimals::Error> {
//!     let request = DigitsRequest::new(Algorithm::Bellard, 200);
//!     let config = RunConfig::from_digits(request, 4)?;
//!
//!     let pi = compute_local(&config)?;
//!     assert!(matching_decimals(&pi, PI_REFERENCE) >= 190);
//!     Ok(())
//! }
//! ```
//!
//! ## Topologies
//!
//! [`compute`] is generic over the [`Communicator`] the ranks share:
//!
//! - [`SelfComm`]: one process, threads only.
//! - [`ChannelComm`]: ranks as threads of one process, for testing the
//!   reduction protocol.
//! - [`ProcessComm`]: ranks as child processes of the root.
//!
//! Inside each rank a [`Team`] of threads sums its blocks into one
//! accumulator; ranks then reduce to rank 0 through the fixed-size [`wire`]
//! format.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

mod big;
mod comm;
mod decimals;
mod distribution;
pub mod env;
mod error;
mod pi;
mod precision;
mod process;
pub mod series;
mod team;
pub mod wire;

pub use big::{BigValue, ROUND, factorial};
pub use comm::{ChannelComm, Communicator, ROOT, SelfComm};
pub use decimals::{PI_REFERENCE, matching_decimals, read_reference};
pub use distribution::{BUILTIN_WORK_RATES, Block, DistributionPolicy, WorkRates};
pub use error::{Error, Result};
pub use pi::{BITS_PER_DIGIT, DigitsRequest, RunConfig, compute, compute_local, compute_pi};
pub use precision::Precision;
pub use process::ProcessComm;
pub use series::{Algorithm, Bbp, Bellard, Chudnovsky, MAX_ITERATIONS, Recurrence, sum_block};
pub use team::Team;

/// Reduction operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    /// Sum of values
    Sum,
    /// Maximum value
    Max,
    /// Minimum value
    Min,
    /// Product of values
    Prod,
}
