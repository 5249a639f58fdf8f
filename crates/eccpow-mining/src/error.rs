//! Mining error types.

use thiserror::Error;

/// Mining errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MiningError {
    /// Trial budget exhausted without an accepted word.
    #[error("No solution found after {trials} trials")]
    NoSolutionFound { trials: u64 },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Worker pool failure.
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Consensus error.
    #[error("Consensus error: {0}")]
    Consensus(#[from] eccpow_consensus::ConsensusError),
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;
