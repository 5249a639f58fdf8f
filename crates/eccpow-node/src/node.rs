//! Node implementation.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use eccpow_consensus::{legacy_hash, prob_to_difficulty, EccpowVerifier};
use eccpow_mining::{
    admitted_candidates, AdmitAll, Admission, HeaderTemplate, Miner, MiningError, TrialOutcome,
};
use num_bigint::BigUint;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A solved header.
#[derive(Debug, Clone)]
pub struct MinedBlock {
    /// Candidate that found the solution.
    pub candidate: usize,
    /// Round the solution was found in (1-based).
    pub round: u64,
    /// The accepted trial.
    pub outcome: TrialOutcome,
}

/// The node: a miner plus the candidates it mines for.
pub struct Node {
    /// Node configuration.
    config: NodeConfig,
    /// Miner shared by all candidates.
    miner: Miner,
    /// Candidate pre-filter.
    admission: Box<dyn Admission>,
    /// Verifier for found solutions.
    verifier: EccpowVerifier,
    /// Parent hash seeding the Tanner graph.
    parent_hash: Vec<u8>,
    /// Header difficulty.
    difficulty: BigUint,
}

impl Node {
    /// Create a new node.
    pub fn new(config: NodeConfig) -> Result<Self> {
        let verifier = EccpowVerifier::new();
        let level = verifier
            .table()
            .level(config.run.level)
            .context("Unknown difficulty level")?;
        let difficulty = prob_to_difficulty(level.mining_probability)?;
        let parent_hash = config.run.parent_hash_bytes()?;

        let miner = Miner::new((&config.mining).into())?;

        info!(
            level = level.level,
            n = level.n,
            difficulty = %difficulty,
            "Node initialized"
        );

        Ok(Self {
            config,
            miner,
            admission: Box::new(AdmitAll),
            verifier,
            parent_hash,
            difficulty,
        })
    }

    /// Replace the candidate pre-filter.
    pub fn with_admission(mut self, admission: Box<dyn Admission>) -> Self {
        self.admission = admission;
        self
    }

    /// Header template for a candidate.
    pub fn template_for(&self, candidate: usize) -> HeaderTemplate {
        let (hash, _) = legacy_hash(format!("node{}", candidate).as_bytes());
        HeaderTemplate {
            header_digest: hash.to_vec(),
            parent_hash: self.parent_hash.clone(),
            difficulty: self.difficulty.clone(),
        }
    }

    /// Mine until a candidate finds a solution or the rounds run out.
    ///
    /// Returns `None` when no candidate was admitted or no round succeeded.
    pub async fn run(&self) -> Result<Option<MinedBlock>> {
        let identities: Vec<String> = (0..self.config.run.candidates)
            .map(|j| format!("node{}", j))
            .collect();
        let admitted = admitted_candidates(
            &*self.admission,
            &identities,
            self.config.run.message.as_bytes(),
        );
        info!(
            admitted = admitted.len(),
            candidates = identities.len(),
            "Candidates admitted"
        );

        let started = Instant::now();
        for round in 1..=self.config.run.rounds {
            for &candidate in &admitted {
                let template = self.template_for(candidate);
                match self.miner.mine(&template).await {
                    Ok(outcome) => {
                        let valid = self
                            .verifier
                            .verify_proof(
                                &template.header_digest,
                                &template.parent_hash,
                                &template.difficulty,
                                &outcome.to_proof(),
                            )
                            .context("Found solution failed verification")?;
                        if !valid {
                            warn!(candidate, nonce = outcome.nonce, "Solution rejected");
                            continue;
                        }

                        info!(
                            candidate,
                            round,
                            nonce = outcome.nonce,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Block mined"
                        );
                        info!("Hash vector: {:?}", outcome.hash_vector);
                        info!("Output word: {:?}", outcome.output_word);
                        info!("Digest: {}", hex::encode(&outcome.digest));

                        return Ok(Some(MinedBlock {
                            candidate,
                            round,
                            outcome,
                        }));
                    }
                    Err(MiningError::NoSolutionFound { trials }) => {
                        debug!(candidate, round, trials, "No solution this attempt");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let stats = self.miner.stats();
        warn!(
            rounds = self.config.run.rounds,
            attempts = stats.tasks_started,
            "No solution found"
        );
        Ok(None)
    }

    /// Stop the miner.
    pub fn shutdown(self) {
        info!("Shutting down node...");
        self.miner.shutdown();
    }
}
