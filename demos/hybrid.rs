//! Hybrid processes + threads example
//!
//! Every process sums its share of the Chudnovsky series on a team of
//! threads; only the main thread of each process takes part in the
//! cross-process reduction.
//!
//! Build: `cargo build --example hybrid`
//! Run:   `PIDECIMALS_THREADS=4 ./target/debug/examples/hybrid 2`
//!
//! The argument is the number of processes (default 2). Spawned ranks write
//! their partial sums to stdout, so everything human-readable goes to stderr.

use pidecimals::{
    Algorithm, Communicator, DigitsRequest, PI_REFERENCE, ProcessComm, Result, RunConfig, compute,
    env, matching_decimals,
};

fn main() -> Result<()> {
    let processes: usize = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(2);
    let threads = env::default_threads();

    let comm = ProcessComm::init(processes)?;
    let rank = comm.rank();
    let size = comm.size();

    let config = RunConfig::from_digits(DigitsRequest::new(Algorithm::Chudnovsky, 2000), threads)?;
    eprintln!(
        "Rank {}/{}: blocks {:?} on {} threads",
        rank,
        size,
        config.blocks_for_rank(rank, size),
        threads
    );

    if let Some(pi) = compute(&comm, &config)? {
        comm.finish()?;
        eprintln!(
            "Rank {}: pi correct to {} decimals",
            rank,
            matching_decimals(&pi, PI_REFERENCE)
        );
    }

    Ok(())
}
