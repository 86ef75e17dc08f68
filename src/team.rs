//! Thread-level fork-join inside one process.
//!
//! A [`Team`] runs one block per task on a dedicated rayon pool. Every task
//! owns its recurrence state and partial sum; when its block is done it adds
//! the partial into a single process-local accumulator behind a
//! `parking_lot::Mutex`, so exactly one thread mutates the accumulator at a
//! time. The scope ends only after every task has finished, which is the
//! implicit barrier at the end of the parallel loop.

use log::debug;
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::big::BigValue;
use crate::distribution::Block;
use crate::error::{Error, Result};
use crate::series::{Recurrence, sum_block};

/// A fixed-size group of worker threads.
///
/// # Example
///
/// ```
/// use pidecimals::{Bellard, Block, Precision, Recurrence, Team};
///
/// let engine = Bellard::new(Precision::new(256).unwrap());
/// let team = Team::new(2).unwrap();
/// let sum = team
///     .sum_blocks(&engine, &[Block::new(0, 10), Block::new(10, 20)])
///     .unwrap();
/// let pi = engine.close(sum).unwrap();
/// assert!((pi.to_f64() - std::f64::consts::PI).abs() < 1e-12);
/// ```
pub struct Team {
    threads: usize,
    pool: Option<ThreadPool>,
}

impl Team {
    /// Create a team of `threads` workers.
    ///
    /// A single-thread team runs its block on the calling thread and builds
    /// no pool.
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(Error::NoThreads);
        }
        let pool = if threads == 1 {
            None
        } else {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("pidecimals-worker-{i}"))
                    .build()?,
            )
        };
        Ok(Team { threads, pool })
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Sum the terms of every block and combine the partials.
    ///
    /// The order in which partials reach the accumulator is unspecified.
    /// If any block fails, the first error is returned and no sum is.
    pub fn sum_blocks<R: Recurrence>(&self, engine: &R, blocks: &[Block]) -> Result<BigValue> {
        let Some(pool) = &self.pool else {
            let mut total = BigValue::zero(engine.precision());
            for block in blocks {
                total.add_assign(&sum_block(engine, *block)?);
            }
            return Ok(total);
        };

        let accumulator = Mutex::new(BigValue::zero(engine.precision()));
        let failure: Mutex<Option<Error>> = Mutex::new(None);
        pool.scope(|scope| {
            for &block in blocks {
                let (accumulator, failure) = (&accumulator, &failure);
                scope.spawn(move |_| match sum_block(engine, block) {
                    Ok(partial) => {
                        debug!("{}: block {block} done", R::NAME);
                        accumulator.lock().add_assign(&partial);
                    }
                    Err(e) => {
                        failure.lock().get_or_insert(e);
                    }
                });
            }
        });

        match failure.into_inner() {
            Some(e) => Err(e),
            None => Ok(accumulator.into_inner()),
        }
    }
}

impl std::fmt::Debug for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Team").field("threads", &self.threads).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimals::{PI_REFERENCE, matching_decimals};
    use crate::distribution::DistributionPolicy;
    use crate::precision::Precision;
    use crate::series::{Bbp, Bellard};

    #[test]
    fn zero_threads_rejected() {
        assert!(matches!(Team::new(0), Err(Error::NoThreads)));
    }

    #[test]
    fn single_thread_runs_inline() {
        let team = Team::new(1).unwrap();
        assert_eq!(team.threads(), 1);
        assert!(team.pool.is_none());
    }

    #[test]
    fn bellard_four_threads_matches_sequential() {
        let engine = Bellard::new(Precision::new(3200).unwrap());
        let sequential = engine
            .close(Team::new(1).unwrap().sum_blocks(&engine, &[Block::new(0, 100)]).unwrap())
            .unwrap();

        let blocks = DistributionPolicy::Uniform.partition(100, 4);
        let threaded = engine
            .close(Team::new(4).unwrap().sum_blocks(&engine, &blocks).unwrap())
            .unwrap();

        assert!(matching_decimals(&sequential, PI_REFERENCE) >= 300);
        assert!(matching_decimals(&threaded, PI_REFERENCE) >= 300);
        assert!(sequential.agrees_within_ulps(&threaded, 64));
    }

    #[test]
    fn more_blocks_than_threads() {
        let engine = Bbp::new(Precision::new(512).unwrap());
        let blocks = DistributionPolicy::Uniform.partition(120, 7);
        let team = Team::new(3).unwrap();
        let sum = team.sum_blocks(&engine, &blocks).unwrap();
        let reference = sum_block(&engine, Block::new(0, 120)).unwrap();
        assert!(sum.agrees_within_ulps(&reference, 64));
    }

    #[test]
    fn no_blocks_sum_to_zero() {
        let engine = Bbp::new(Precision::new(128).unwrap());
        assert!(Team::new(2).unwrap().sum_blocks(&engine, &[]).unwrap().is_zero());
    }
}
