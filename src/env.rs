//! Environment helpers for rank bootstrap and thread defaults.
//!
//! The launcher hands each spawned rank its place in the world through
//! environment variables. A process with none of them set is the root of a
//! new world.
//!
//! # Environment Variables
//!
//! | Function | Variable | Description |
//! |----------|----------|-------------|
//! | `rank()` | `PIDECIMALS_RANK` | Rank of this process in the world |
//! | `size()` | `PIDECIMALS_SIZE` | Number of processes in the world |
//! | `default_threads()` | `PIDECIMALS_THREADS`, then `OMP_NUM_THREADS` | Threads per process |

use std::env;

use crate::error::{Error, Result};

/// Variable carrying the rank of a spawned process.
pub const RANK_VAR: &str = "PIDECIMALS_RANK";
/// Variable carrying the world size of a spawned process.
pub const SIZE_VAR: &str = "PIDECIMALS_SIZE";
/// Variable overriding the default number of threads per process.
pub const THREADS_VAR: &str = "PIDECIMALS_THREADS";

/// Check if this process was spawned as a rank of a larger world.
pub fn is_spawned_rank() -> bool {
    env::var_os(RANK_VAR).is_some()
}

/// Get the rank handed down by the launcher.
pub fn rank() -> Option<usize> {
    env::var(RANK_VAR).ok().and_then(|s| s.trim().parse().ok())
}

/// Get the world size handed down by the launcher.
pub fn size() -> Option<usize> {
    env::var(SIZE_VAR).ok().and_then(|s| s.trim().parse().ok())
}

/// Rank and size of a spawned process, or `None` for a root process.
///
/// # Errors
///
/// [`Error::Transport`] when only one of the variables is set or either does
/// not parse, [`Error::InvalidRank`] when the rank is outside the world.
pub fn topology() -> Result<Option<(usize, usize)>> {
    let has_rank = is_spawned_rank();
    let has_size = env::var_os(SIZE_VAR).is_some();
    if !has_rank && !has_size {
        return Ok(None);
    }
    let (Some(rank), Some(size)) = (rank(), size()) else {
        return Err(Error::Transport(format!(
            "{RANK_VAR} and {SIZE_VAR} must both be set to non-negative integers"
        )));
    };
    if rank >= size {
        return Err(Error::InvalidRank { rank, size });
    }
    Ok(Some((rank, size)))
}

/// Threads per process when none is requested explicitly.
///
/// Reads [`THREADS_VAR`], falls back to `OMP_NUM_THREADS`, then to 1.
pub fn default_threads() -> usize {
    [THREADS_VAR, "OMP_NUM_THREADS"]
        .iter()
        .find_map(|var| env::var(var).ok().and_then(|s| s.trim().parse().ok()))
        .filter(|&n: &usize| n > 0)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that mutate environment variables are combined into a single test
    /// to avoid data races when tests run in parallel.
    #[test]
    fn rank_env_var_parsing() {
        // --- no variables: root process ---
        unsafe {
            env::remove_var(RANK_VAR);
            env::remove_var(SIZE_VAR);
        }
        assert!(!is_spawned_rank());
        assert_eq!(topology().unwrap(), None);

        // --- both set: spawned rank ---
        unsafe {
            env::set_var(RANK_VAR, "2");
            env::set_var(SIZE_VAR, "4");
        }
        assert!(is_spawned_rank());
        assert_eq!(rank(), Some(2));
        assert_eq!(size(), Some(4));
        assert_eq!(topology().unwrap(), Some((2, 4)));

        // --- rank outside the world ---
        unsafe {
            env::set_var(RANK_VAR, "4");
        }
        assert!(matches!(topology(), Err(Error::InvalidRank { rank: 4, size: 4 })));

        // --- only one variable set ---
        unsafe {
            env::remove_var(SIZE_VAR);
        }
        assert!(matches!(topology(), Err(Error::Transport(_))));

        // --- garbage ---
        unsafe {
            env::set_var(RANK_VAR, "first");
            env::set_var(SIZE_VAR, "4");
        }
        assert_eq!(rank(), None);
        assert!(matches!(topology(), Err(Error::Transport(_))));
        unsafe {
            env::remove_var(RANK_VAR);
            env::remove_var(SIZE_VAR);
        }

        // --- default_threads: own variable beats OMP_NUM_THREADS ---
        unsafe {
            env::set_var(THREADS_VAR, "6");
            env::set_var("OMP_NUM_THREADS", "3");
        }
        assert_eq!(default_threads(), 6);
        unsafe {
            env::remove_var(THREADS_VAR);
        }
        assert_eq!(default_threads(), 3);

        // --- default_threads: zero and unset fall back to one ---
        unsafe {
            env::set_var("OMP_NUM_THREADS", "0");
        }
        assert_eq!(default_threads(), 1);
        unsafe {
            env::remove_var("OMP_NUM_THREADS");
        }
        assert_eq!(default_threads(), 1);
    }
}
