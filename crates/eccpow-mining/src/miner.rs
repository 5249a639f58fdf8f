//! Miner implementation.
//!
//! The miner turns a header template into a `PowContext` once, hands it to
//! the worker pool and waits for the first accepted trial or for every
//! worker to run out of budget.

use crate::solver::{EccpowSolver, TrialOutcome};
use crate::worker::{MiningTask, WorkerEvent, WorkerPool};
use crate::{MiningError, MiningResult, DEFAULT_BATCH_SIZE, DEFAULT_MAX_TRIALS};
use eccpow_consensus::{DifficultyTable, EccpowVerifier, PowContext};
use num_bigint::BigUint;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

/// Miner configuration.
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Number of mining threads (0 = one per available core).
    pub threads: usize,
    /// Trial budget per header, shared by all threads.
    pub max_trials: u64,
    /// Trials a worker claims at a time.
    pub batch_size: u64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            max_trials: DEFAULT_MAX_TRIALS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl MinerConfig {
    /// Thread count with `0` resolved to the number of available cores.
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }
}

/// What a miner needs to know about the block being mined.
#[derive(Debug, Clone)]
pub struct HeaderTemplate {
    /// Prepared header digest placed in front of the nonce.
    pub header_digest: Vec<u8>,
    /// Parent hash, used only to seed the Tanner graph.
    pub parent_hash: Vec<u8>,
    /// Block difficulty.
    pub difficulty: BigUint,
}

/// Mining statistics.
#[derive(Debug, Clone, Default)]
pub struct MiningStats {
    /// Headers handed to the worker pool.
    pub tasks_started: u64,
    /// Headers solved.
    pub solutions_found: u64,
    /// Headers whose budget ran out.
    pub budgets_exhausted: u64,
}

/// ECCPoW miner.
pub struct Miner {
    /// Configuration.
    config: MinerConfig,
    /// Difficulty table used to pick levels.
    table: DifficultyTable,
    /// Worker pool.
    pool: Mutex<WorkerPool>,
    /// Solver used to re-check found solutions.
    solver: EccpowSolver,
    /// Next task id.
    next_task_id: AtomicU64,
    /// Mining statistics.
    stats: RwLock<MiningStats>,
}

impl Miner {
    /// Create a miner over the reference difficulty table.
    pub fn new(config: MinerConfig) -> MiningResult<Self> {
        Self::with_table(config, DifficultyTable::reference().clone())
    }

    /// Create a miner over a custom difficulty table.
    pub fn with_table(config: MinerConfig, table: DifficultyTable) -> MiningResult<Self> {
        if config.max_trials == 0 {
            return Err(MiningError::InvalidConfig(
                "trial budget must be positive".to_string(),
            ));
        }

        let threads = config.effective_threads();
        let pool = WorkerPool::new(threads)
            .map_err(|e| MiningError::WorkerPool(format!("failed to spawn workers: {}", e)))?;

        info!(
            threads,
            max_trials = config.max_trials,
            batch_size = config.batch_size,
            "Miner started"
        );

        Ok(Self {
            config,
            solver: EccpowSolver::with_verifier(EccpowVerifier::with_table(table.clone())),
            table,
            pool: Mutex::new(pool),
            next_task_id: AtomicU64::new(1),
            stats: RwLock::new(MiningStats::default()),
        })
    }

    /// Build the per-header context.
    pub fn context_for(&self, header: &HeaderTemplate) -> MiningResult<PowContext> {
        Ok(PowContext::for_header(
            &self.table,
            &header.parent_hash,
            &header.difficulty,
        )?)
    }

    /// Mine a header until a trial is accepted or the budget is exhausted.
    pub async fn mine(&self, header: &HeaderTemplate) -> MiningResult<TrialOutcome> {
        let context = Arc::new(self.context_for(header)?);
        self.mine_context(&header.header_digest, context).await
    }

    /// Mine with an already built context.
    pub async fn mine_context(
        &self,
        header_digest: &[u8],
        context: Arc<PowContext>,
    ) -> MiningResult<TrialOutcome> {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let task = MiningTask::new(
            task_id,
            header_digest.to_vec(),
            Arc::clone(&context),
            self.config.max_trials,
            self.config.batch_size,
        );

        let mut pool = self.pool.lock().await;
        let num_workers = pool.num_workers();

        // Drop anything left over from earlier tasks
        while pool.try_recv_event().is_some() {}

        pool.broadcast_task(task);
        self.stats.write().tasks_started += 1;
        debug!(task_id, level = context.level.level, "Task broadcast");

        let mut exhausted = HashSet::new();
        loop {
            let event = pool.recv_event().await.ok_or_else(|| {
                MiningError::WorkerPool("all workers disconnected".to_string())
            })?;

            match event {
                WorkerEvent::Found(found) if found.task_id == task_id => {
                    pool.clear_task();

                    if !self.solver.verify(header_digest, &context, &found.outcome) {
                        return Err(MiningError::WorkerPool(format!(
                            "worker {} reported a solution that does not verify",
                            found.worker_id
                        )));
                    }

                    info!(
                        task_id,
                        worker_id = found.worker_id,
                        nonce = found.outcome.nonce,
                        "Valid solution found!"
                    );
                    self.stats.write().solutions_found += 1;
                    return Ok(found.outcome);
                }
                WorkerEvent::Exhausted { task_id: id, worker_id } if id == task_id => {
                    exhausted.insert(worker_id);
                    if exhausted.len() == num_workers {
                        pool.clear_task();
                        debug!(task_id, "Every worker exhausted the trial budget");
                        self.stats.write().budgets_exhausted += 1;
                        return Err(MiningError::NoSolutionFound {
                            trials: self.config.max_trials,
                        });
                    }
                }
                _ => trace!(task_id, "Ignoring event from a stale task"),
            }
        }
    }

    /// Get mining statistics.
    pub fn stats(&self) -> MiningStats {
        self.stats.read().clone()
    }

    /// Get the configuration.
    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Total trials run by the pool.
    pub async fn total_trials(&self) -> u64 {
        self.pool.lock().await.total_trial_count()
    }

    /// Stop the workers and wait for them to exit.
    pub fn shutdown(self) {
        self.pool.into_inner().shutdown();
    }
}
