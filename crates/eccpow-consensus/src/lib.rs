//! # eccpow-consensus
//!
//! Consensus rules for ECCPoW, the error-correcting-code proof-of-work.
//!
//! This crate provides:
//! - The difficulty level table and nearest-level selection
//! - Deterministic Tanner graph (LDPC parity-check matrix) construction
//! - Hash vector expansion of trial digests
//! - The log-domain sum-product belief-propagation decoder
//! - Codeword and Hamming-weight window validation
//! - Proof verification
//!
//! ## ECCPoW
//!
//! For each nonce attempt a miner hashes `header || nonce` with Keccak-512,
//! expands the leading bytes into an `n`-bit hash vector and decodes it over a
//! regular LDPC code derived from the parent hash. The attempt succeeds when
//! the decoded word satisfies every parity check and its Hamming weight lies
//! in the window fixed by the difficulty level.
//!
//! Verification does not need the decoder: a verifier recomputes the digest
//! and hash vector from the nonce and checks the claimed output word.

mod decoder;
mod difficulty;
mod error;
mod graph;
mod hash_vector;
mod hashing;
mod validity;
mod verifier;

pub use decoder::{clamp_llr, saturating_log_tanh, BeliefPropagationDecoder};
pub use difficulty::{
    difficulty_to_probability, prob_to_difficulty, DifficultyLevel, DifficultyTable,
};
pub use error::{ConsensusError, ConsensusResult};
pub use graph::{seed_from_parent_hash, DecodingParameters, TannerGraph};
pub use hash_vector::{from_hash_vector, to_hash_vector};
pub use hashing::{keccak512, legacy_hash, trial_digest, TRIAL_DIGEST_SIZE};
pub use validity::{hamming_weight, is_valid, parity_holds, weight_in_window};
pub use verifier::{EccpowProof, EccpowVerifier, PowContext};

/// ECCPoW decoding parameters.
pub mod params {
    /// Number of decoder rounds. The decoder always runs all of them.
    pub const MAX_ITERATIONS: usize = 20;

    /// Crossover error probability of the binary symmetric channel used to
    /// seed the channel LLRs.
    pub const CROSSOVER_ERROR: f64 = 0.01;

    /// Saturation bound applied to every LLR update.
    pub const LLR_BOUND: f64 = 64.0;

    /// Saturation bound of the log-tanh transform.
    pub const BIG_INFINITY: f64 = 1_000_000.0;

    /// Number of header digest bytes placed in front of the nonce.
    pub const HEADER_DIGEST_LEN: usize = 32;

    /// Width of the `header || nonce` buffer hashed per trial.
    pub const NONCE_BUFFER_LEN: usize = HEADER_DIGEST_LEN + 8;
}
