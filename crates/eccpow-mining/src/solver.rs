//! ECCPoW solver for CPU mining.
//!
//! For each nonce attempt the solver:
//!
//! 1. Computes digest = Keccak512(header_digest || nonce_le)
//! 2. Expands the leading `n / 8` digest bytes into the hash vector
//! 3. Decodes the hash vector over the header's Tanner graph
//! 4. Accepts when the output word is a codeword whose weight lies in the
//!    level's decision window
//!
//! The Tanner graph is built once per header (see [`PowContext`]); a trial
//! only allocates its own vectors and reuses the decoder's scratch buffers.

use crate::nonce::NonceSource;
use crate::{MiningError, MiningResult};
use eccpow_consensus::{
    is_valid, to_hash_vector, trial_digest, BeliefPropagationDecoder, EccpowProof,
    EccpowVerifier, PowContext,
};
use tracing::{debug, trace};

/// Result of one nonce trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    /// Whether the output word was accepted.
    pub accepted: bool,
    /// Nonce tried.
    pub nonce: u64,
    /// Trial digest.
    pub digest: Vec<u8>,
    /// Hash vector fed to the decoder.
    pub hash_vector: Vec<u8>,
    /// Decoder output.
    pub output_word: Vec<u8>,
}

impl TrialOutcome {
    /// The proof carried by this outcome.
    pub fn to_proof(&self) -> EccpowProof {
        EccpowProof {
            nonce: self.nonce,
            digest: self.digest.clone(),
            hash_vector: self.hash_vector.clone(),
            output_word: self.output_word.clone(),
        }
    }
}

/// ECCPoW solver for CPU mining.
#[derive(Debug, Clone, Default)]
pub struct EccpowSolver {
    /// Verifier for validating solutions.
    verifier: EccpowVerifier,
}

impl EccpowSolver {
    /// Create a new solver over the reference difficulty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a solver whose verifier uses `verifier`'s table.
    pub fn with_verifier(verifier: EccpowVerifier) -> Self {
        Self { verifier }
    }

    /// Search for an accepted nonce.
    ///
    /// # Arguments
    /// * `header_digest` - Prepared header digest
    /// * `context` - Level and Tanner graph for the header
    /// * `max_trials` - Maximum nonce attempts before giving up
    /// * `nonces` - Source of nonces to try
    ///
    /// # Returns
    /// The first accepted outcome, or `NoSolutionFound` when the budget or the
    /// nonce source runs out.
    pub fn search(
        &self,
        header_digest: &[u8],
        context: &PowContext,
        max_trials: u64,
        nonces: &mut dyn NonceSource,
    ) -> MiningResult<TrialOutcome> {
        let mut decoder = BeliefPropagationDecoder::new(&context.graph);

        let mut trials = 0;
        while trials < max_trials {
            let Some(nonce) = nonces.next_nonce() else {
                trace!(trials, "Nonce source exhausted");
                break;
            };
            trials += 1;

            let outcome = self.try_nonce(header_digest, context, &mut decoder, nonce)?;
            if outcome.accepted {
                debug!(
                    "Found valid solution after {} trials, nonce={}",
                    trials, nonce
                );
                return Ok(outcome);
            }
        }

        Err(MiningError::NoSolutionFound { trials })
    }

    /// Try up to `batch_size` nonces with a caller-owned decoder.
    ///
    /// Returns `Ok(None)` when no trial in the batch is accepted.
    pub fn search_batch(
        &self,
        header_digest: &[u8],
        context: &PowContext,
        decoder: &mut BeliefPropagationDecoder<'_>,
        nonces: &mut dyn NonceSource,
        batch_size: u64,
    ) -> MiningResult<Option<TrialOutcome>> {
        for _ in 0..batch_size {
            let Some(nonce) = nonces.next_nonce() else {
                return Ok(None);
            };

            let outcome = self.try_nonce(header_digest, context, decoder, nonce)?;
            if outcome.accepted {
                return Ok(Some(outcome));
            }
        }

        Ok(None)
    }

    /// Run a single nonce trial.
    pub fn try_nonce(
        &self,
        header_digest: &[u8],
        context: &PowContext,
        decoder: &mut BeliefPropagationDecoder<'_>,
        nonce: u64,
    ) -> MiningResult<TrialOutcome> {
        let digest = trial_digest(header_digest, nonce);
        let hash_vector = to_hash_vector(&digest, context.params.n)?;
        let output_word = decoder.decode(&hash_vector)?;
        let accepted = is_valid(&output_word, &context.graph, &context.level);

        Ok(TrialOutcome {
            accepted,
            nonce,
            digest: digest.to_vec(),
            hash_vector,
            output_word,
        })
    }

    /// Verify an outcome using the internal verifier.
    pub fn verify(&self, header_digest: &[u8], context: &PowContext, outcome: &TrialOutcome) -> bool {
        self.verifier
            .verify_in_context(context, header_digest, &outcome.to_proof())
            .unwrap_or(false)
    }
}
