//! Error types for consensus validation.

use thiserror::Error;

/// Consensus validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Difficulty is zero or cannot be represented as a probability.
    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),

    /// Digest too short to fill the hash vector.
    #[error("Insufficient digest: need {needed} bytes, got {got}")]
    InsufficientDigest { needed: usize, got: usize },

    /// Difficulty table violates its invariants, or a level is missing.
    #[error("Malformed difficulty table: {0}")]
    MalformedTable(String),

    /// Vector length does not match the code length.
    #[error("Length mismatch: expected {expected} bits, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Proof is structurally invalid.
    #[error("Invalid proof: {0}")]
    InvalidProof(String),
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;
