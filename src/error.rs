//! Error types for pidecimals

use thiserror::Error;

/// Result type for pi computations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for pi computations
#[derive(Error, Debug)]
pub enum Error {
    /// Precision must be a positive number of bits
    #[error("Precision should be greater than zero (got {0} bits)")]
    InvalidPrecision(u64),

    /// Precision exceeds what the arithmetic backend can allocate
    #[error("Precision of {requested} bits exceeds the supported maximum of {max} bits")]
    PrecisionTooLarge {
        /// Requested precision in bits
        requested: u64,
        /// Largest precision the backend supports
        max: u64,
    },

    /// At least one thread per process is required
    #[error("Number of threads should be greater than zero")]
    NoThreads,

    /// At least one process is required
    #[error("Number of processes should be greater than zero")]
    NoProcesses,

    /// Iteration index does not fit the supported range
    #[error("Iteration count {requested} exceeds the supported maximum of {max}")]
    TooManyIterations {
        /// Requested iteration count
        requested: u64,
        /// Largest supported iteration count
        max: u64,
    },

    /// Not enough iterations to give every worker a block
    #[error(
        "The number of iterations ({iterations}) is too small to be solved with {workers} workers; \
         try a greater precision or fewer threads/processes"
    )]
    InsufficientIterations {
        /// Iterations that would be computed
        iterations: u64,
        /// Total number of workers (threads x processes)
        workers: usize,
    },

    /// A closing transform divided by a zero sum
    #[error("Division by zero in the closing transform of {0}")]
    DivisionByZero(&'static str),

    /// NaN or infinity cannot be packed for transport
    #[error("Cannot pack a non-finite value")]
    NonFinite,

    /// Buffer does not have the layout expected for the current precision
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// Unknown algorithm name or id
    #[error("Unknown algorithm '{0}' (expected bbp, bellard or chudnovsky)")]
    UnknownAlgorithm(String),

    /// Work-rate table failed validation
    #[error("Invalid work-rate table: {0}")]
    InvalidWorkRates(String),

    /// Invalid rank specified
    #[error("Invalid rank {rank} for a world of size {size}")]
    InvalidRank {
        /// Offending rank
        rank: usize,
        /// World size
        size: usize,
    },

    /// This process already joined a multi-process world
    #[error("Process world already initialized")]
    AlreadyInitialized,

    /// Rank bootstrap or message transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O failure (pipes, child processes, table files)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Thread pool could not be built
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Work-rate table is not valid TOML
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the error was raised by configuration validation, before any
    /// worker started.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidPrecision(_)
                | Error::PrecisionTooLarge { .. }
                | Error::NoThreads
                | Error::NoProcesses
                | Error::TooManyIterations { .. }
                | Error::InsufficientIterations { .. }
                | Error::UnknownAlgorithm(_)
                | Error::InvalidWorkRates(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_classified() {
        assert!(Error::InvalidPrecision(0).is_configuration());
        assert!(Error::NoThreads.is_configuration());
        assert!(
            Error::InsufficientIterations {
                iterations: 3,
                workers: 4
            }
            .is_configuration()
        );
        assert!(!Error::DivisionByZero("Chudnovsky").is_configuration());
        assert!(!Error::Transport("closed".into()).is_configuration());
    }

    #[test]
    fn messages_name_the_failed_check() {
        assert_eq!(
            Error::InvalidPrecision(0).to_string(),
            "Precision should be greater than zero (got 0 bits)"
        );
        let msg = Error::InsufficientIterations {
            iterations: 2,
            workers: 8,
        }
        .to_string();
        assert!(msg.contains("(2)"), "{msg}");
        assert!(msg.contains("8 workers"), "{msg}");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "pipe closed");
    }
}
