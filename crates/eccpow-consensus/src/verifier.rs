//! ECCPoW proof verification.
//!
//! A proof is a nonce together with the trial digest, hash vector and output
//! word the miner obtained. Verification:
//!
//! 1. Selects the difficulty level and rebuilds the Tanner graph from the
//!    parent hash
//! 2. Recomputes `keccak512(header_digest || nonce)` and compares it to the
//!    claimed digest
//! 3. Recomputes the hash vector from the digest and compares it
//! 4. Checks the claimed output word against every parity equation and the
//!    level's weight window
//!
//! The decoder is not needed for these steps. Strict verification
//! additionally re-runs the decoder and requires it to reproduce the claimed
//! output word.

use crate::decoder::BeliefPropagationDecoder;
use crate::difficulty::{DifficultyLevel, DifficultyTable};
use crate::graph::{DecodingParameters, TannerGraph};
use crate::hash_vector::to_hash_vector;
use crate::hashing::trial_digest;
use crate::validity::is_valid;
use crate::{ConsensusError, ConsensusResult};
use num_bigint::BigUint;
use tracing::{debug, trace};

/// Everything derived once per header: the level, the code parameters and
/// the Tanner graph. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PowContext {
    /// Selected difficulty level.
    pub level: DifficultyLevel,
    /// Code parameters and graph seed.
    pub params: DecodingParameters,
    /// Parity-check matrix and adjacency.
    pub graph: TannerGraph,
}

impl PowContext {
    /// Build the context for a level and an explicit graph seed.
    ///
    /// The level is checked on its own, since it need not come from a
    /// validated table.
    pub fn new(level: DifficultyLevel, seed: i64) -> ConsensusResult<Self> {
        level.validate_shape()?;
        let params = DecodingParameters::with_seed(&level, seed)?;
        Ok(Self {
            level,
            params,
            graph: TannerGraph::build(params),
        })
    }

    /// Build the context for a header.
    pub fn for_header(
        table: &DifficultyTable,
        parent_hash: &[u8],
        difficulty: &BigUint,
    ) -> ConsensusResult<Self> {
        let level = *table.select_level(difficulty)?;
        let params = DecodingParameters::for_level(&level, parent_hash)?;
        debug!(
            level = level.level,
            n = params.n,
            m = params.m,
            seed = params.seed,
            "Building ECCPoW context"
        );
        Ok(Self {
            level,
            params,
            graph: TannerGraph::build(params),
        })
    }
}

/// A claimed ECCPoW solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccpowProof {
    /// Nonce that produced the digest.
    pub nonce: u64,
    /// Trial digest, `keccak512(header_digest || nonce)`.
    pub digest: Vec<u8>,
    /// Hash vector expanded from the digest.
    pub hash_vector: Vec<u8>,
    /// Decoded output word.
    pub output_word: Vec<u8>,
}

/// ECCPoW verifier.
#[derive(Debug, Clone)]
pub struct EccpowVerifier {
    table: DifficultyTable,
}

impl Default for EccpowVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EccpowVerifier {
    /// Create a verifier over the reference difficulty table.
    pub fn new() -> Self {
        Self {
            table: DifficultyTable::reference().clone(),
        }
    }

    /// Create a verifier over a custom table.
    pub fn with_table(table: DifficultyTable) -> Self {
        Self { table }
    }

    /// The difficulty table in use.
    pub fn table(&self) -> &DifficultyTable {
        &self.table
    }

    /// Verify a proof for a header.
    ///
    /// # Returns
    /// * `Ok(true)` if the proof is valid
    /// * `Ok(false)` if the output word is not an accepted codeword
    /// * `Err` if the proof does not belong to this header and nonce
    pub fn verify_proof(
        &self,
        header_digest: &[u8],
        parent_hash: &[u8],
        difficulty: &BigUint,
        proof: &EccpowProof,
    ) -> ConsensusResult<bool> {
        let context = PowContext::for_header(&self.table, parent_hash, difficulty)?;
        self.verify_in_context(&context, header_digest, proof)
    }

    /// Verify a proof against an already built context.
    pub fn verify_in_context(
        &self,
        context: &PowContext,
        header_digest: &[u8],
        proof: &EccpowProof,
    ) -> ConsensusResult<bool> {
        self.check_derivation(context, header_digest, proof)?;

        let valid = is_valid(&proof.output_word, &context.graph, &context.level);
        debug!(
            nonce = proof.nonce,
            level = context.level.level,
            valid,
            "ECCPoW proof checked"
        );
        Ok(valid)
    }

    /// Verify a proof and additionally require the decoder to reproduce the
    /// claimed output word.
    pub fn verify_with_decoding(
        &self,
        header_digest: &[u8],
        parent_hash: &[u8],
        difficulty: &BigUint,
        proof: &EccpowProof,
    ) -> ConsensusResult<bool> {
        let context = PowContext::for_header(&self.table, parent_hash, difficulty)?;
        if !self.verify_in_context(&context, header_digest, proof)? {
            return Ok(false);
        }

        let mut decoder = BeliefPropagationDecoder::new(&context.graph);
        let decoded = decoder.decode(&proof.hash_vector)?;
        Ok(decoded == proof.output_word)
    }

    fn check_derivation(
        &self,
        context: &PowContext,
        header_digest: &[u8],
        proof: &EccpowProof,
    ) -> ConsensusResult<()> {
        let n = context.params.n;
        if proof.output_word.len() != n {
            return Err(ConsensusError::LengthMismatch {
                expected: n,
                got: proof.output_word.len(),
            });
        }

        let digest = trial_digest(header_digest, proof.nonce);
        trace!("Recomputed trial digest: {}", hex::encode(digest));
        if proof.digest != digest {
            return Err(ConsensusError::InvalidProof(format!(
                "digest mismatch for nonce {}",
                proof.nonce
            )));
        }

        let hash_vector = to_hash_vector(&digest, n)?;
        if proof.hash_vector != hash_vector {
            return Err(ConsensusError::InvalidProof(
                "hash vector does not match the digest".into(),
            ));
        }

        Ok(())
    }
}
