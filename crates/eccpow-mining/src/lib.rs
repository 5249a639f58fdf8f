//! # eccpow-mining
//!
//! Mining support for ECCPoW.
//!
//! This crate provides:
//! - The nonce search loop (sequential solver)
//! - Nonce sources (cryptographically seeded or fixed sequences)
//! - A worker pool racing on independent nonces across threads
//! - A miner coordinating the pool per header
//! - The admission pre-filter interface applied to candidate identities

mod admission;
mod error;
mod miner;
mod nonce;
mod solver;
mod worker;

pub use admission::{
    admitted_candidates, norm_bound_for, AdmitAll, Admission, NormBoundAdmission, NORM_BOUNDS,
};
pub use error::{MiningError, MiningResult};
pub use miner::{HeaderTemplate, Miner, MinerConfig, MiningStats};
pub use nonce::{FixedNonces, NonceSource, RandomNonces};
pub use solver::{EccpowSolver, TrialOutcome};
pub use worker::{FoundSolution, MiningTask, MiningWorker, WorkerEvent, WorkerPool};

/// Default number of trials a worker claims at a time.
pub const DEFAULT_BATCH_SIZE: u64 = 32;

/// Default trial budget for one header.
pub const DEFAULT_MAX_TRIALS: u64 = 1 << 22;
