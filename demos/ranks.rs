//! Reduction protocol walkthrough with ranks as threads.
//!
//! Runs each series on an in-process world of four ranks, printing the block
//! every rank owns and the partial sum it contributes before the reduction
//! to rank 0.
//!
//! Run with: `cargo run --example ranks`

use pidecimals::{
    Algorithm, Bbp, Bellard, ChannelComm, Chudnovsky, Communicator, DigitsRequest, PI_REFERENCE,
    Recurrence, ReduceOp, Result, RunConfig, Team, matching_decimals,
};

const RANKS: usize = 4;

fn walk<R: Recurrence>(engine: &R, config: &RunConfig) -> Result<()> {
    let results = ChannelComm::run(RANKS, |comm| {
        let blocks = config.blocks_for_rank(comm.rank(), comm.size());
        let local = Team::new(config.threads)?.sum_blocks(engine, &blocks)?;
        println!(
            "  rank {} owns {:?}, partial sum ~ {:.6e}",
            comm.rank(),
            blocks,
            local.to_f64()
        );
        comm.reduce(&local, engine.precision(), ReduceOp::Sum, 0)
    })?;

    if let Some(Some(sum)) = results.into_iter().next() {
        let pi = engine.close(sum)?;
        println!(
            "  {}: {} correct decimals\n",
            R::NAME,
            matching_decimals(&pi, PI_REFERENCE)
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    for algorithm in Algorithm::ALL {
        let config = RunConfig::from_digits(DigitsRequest::new(algorithm, 600), 2)?;
        println!(
            "{algorithm}: {} iterations over {RANKS} ranks x {} threads",
            config.iterations, config.threads
        );
        let p = config.precision;
        match algorithm {
            Algorithm::Bbp => walk(&Bbp::new(p), &config)?,
            Algorithm::Bellard => walk(&Bellard::new(p), &config)?,
            Algorithm::Chudnovsky => walk(&Chudnovsky::new(p), &config)?,
        }
    }
    Ok(())
}
