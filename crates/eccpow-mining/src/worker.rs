//! Mining worker thread implementation.
//!
//! This module provides the `MiningWorker` which runs in a separate thread
//! and searches for accepted nonces on the current task. Workers share the
//! task's Tanner graph read-only and own their decoder buffers and nonce
//! source, so the decode path takes no locks. Workers communicate with the
//! coordinator via channels.

use crate::nonce::RandomNonces;
use crate::solver::{EccpowSolver, TrialOutcome};
use eccpow_consensus::{BeliefPropagationDecoder, PowContext};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// How long an idle worker sleeps before checking for new work.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A mining task describing the work to be done.
#[derive(Clone, Debug)]
pub struct MiningTask {
    /// Task id, used to discard events from earlier tasks.
    pub id: u64,
    /// Prepared header digest.
    pub header_digest: Vec<u8>,
    /// Level and Tanner graph, built before the task is broadcast.
    pub context: Arc<PowContext>,
    /// Trials claimed so far by all workers.
    pub trials_claimed: Arc<AtomicU64>,
    /// Trial budget shared by all workers.
    pub max_trials: u64,
    /// Trials a worker claims at a time.
    pub batch_size: u64,
}

impl MiningTask {
    /// Create a task with a fresh trial counter.
    pub fn new(
        id: u64,
        header_digest: Vec<u8>,
        context: Arc<PowContext>,
        max_trials: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            id,
            header_digest,
            context,
            trials_claimed: Arc::new(AtomicU64::new(0)),
            max_trials,
            batch_size: batch_size.max(1),
        }
    }

    /// Claim the next batch of trials. Returns the number of trials granted,
    /// or `None` once the budget is spent.
    pub fn claim_batch(&self) -> Option<u64> {
        let start = self
            .trials_claimed
            .fetch_add(self.batch_size, Ordering::Relaxed);
        if start >= self.max_trials {
            return None;
        }
        Some(self.batch_size.min(self.max_trials - start))
    }
}

/// A solution found by a worker.
#[derive(Debug)]
pub struct FoundSolution {
    /// The accepted trial.
    pub outcome: TrialOutcome,
    /// The task this solution is for.
    pub task_id: u64,
    /// Worker ID that found the solution.
    pub worker_id: usize,
}

/// Events reported by workers to the coordinator.
#[derive(Debug)]
pub enum WorkerEvent {
    /// A worker found an accepted nonce.
    Found(FoundSolution),
    /// A worker could not claim any more trials for the task.
    Exhausted { task_id: u64, worker_id: usize },
}

/// A mining worker that runs in its own thread.
pub struct MiningWorker {
    /// Worker ID.
    id: usize,
    /// Handle to the worker thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to stop the worker.
    running: Arc<AtomicBool>,
    /// Trial counter for statistics.
    trial_count: Arc<AtomicU64>,
}

impl MiningWorker {
    /// Spawn a new mining worker.
    ///
    /// # Arguments
    /// * `id` - Unique worker ID
    /// * `task_rx` - Receiver for mining tasks
    /// * `event_tx` - Sender for worker events
    ///
    /// # Returns
    /// A new `MiningWorker` with a running background thread.
    pub fn spawn(
        id: usize,
        task_rx: watch::Receiver<Option<MiningTask>>,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let trial_count = Arc::new(AtomicU64::new(0));

        let running_clone = Arc::clone(&running);
        let trial_count_clone = Arc::clone(&trial_count);

        let handle = thread::Builder::new()
            .name(format!("eccpow-worker-{}", id))
            .spawn(move || {
                Self::worker_loop(id, task_rx, event_tx, running_clone, trial_count_clone);
            })?;

        info!(worker_id = id, "Mining worker spawned");

        Ok(Self {
            id,
            handle: Some(handle),
            running,
            trial_count,
        })
    }

    /// The main worker loop.
    fn worker_loop(
        id: usize,
        mut task_rx: watch::Receiver<Option<MiningTask>>,
        event_tx: mpsc::Sender<WorkerEvent>,
        running: Arc<AtomicBool>,
        trial_count: Arc<AtomicU64>,
    ) {
        let solver = EccpowSolver::new();
        let mut nonces = RandomNonces::new();

        while running.load(Ordering::Relaxed) {
            // Mark current value as seen so has_changed() works correctly
            let task = task_rx.borrow_and_update().clone();

            match task {
                Some(task) => {
                    let event = Self::mine_task(
                        id,
                        &solver,
                        &task,
                        &mut nonces,
                        &task_rx,
                        &running,
                        &trial_count,
                    );

                    if let Some(event) = event {
                        // Use blocking send since we're in a non-async thread
                        if event_tx.blocking_send(event).is_err() {
                            warn!(worker_id = id, "Failed to send event, channel closed");
                            return;
                        }
                        Self::wait_for_new_work(&task_rx, &running);
                    }
                }
                None => {
                    trace!(worker_id = id, "No work available, waiting...");
                    Self::wait_for_new_work(&task_rx, &running);
                }
            }
        }

        info!(
            worker_id = id,
            total_trials = trial_count.load(Ordering::Relaxed),
            "Worker shutting down"
        );
    }

    /// Mine on a task until a solution is found, the budget is spent, or the
    /// task is replaced. Returns the event to report, if any.
    fn mine_task(
        id: usize,
        solver: &EccpowSolver,
        task: &MiningTask,
        nonces: &mut RandomNonces,
        task_rx: &watch::Receiver<Option<MiningTask>>,
        running: &AtomicBool,
        trial_count: &AtomicU64,
    ) -> Option<WorkerEvent> {
        let mut decoder = BeliefPropagationDecoder::new(&task.context.graph);

        loop {
            if !running.load(Ordering::Relaxed) {
                return None;
            }

            // Only true if the task changed after we picked it up
            if task_rx.has_changed().unwrap_or(false) {
                trace!(worker_id = id, "New work received, switching tasks");
                return None;
            }

            let Some(batch) = task.claim_batch() else {
                debug!(worker_id = id, task_id = task.id, "Trial budget exhausted");
                return Some(WorkerEvent::Exhausted {
                    task_id: task.id,
                    worker_id: id,
                });
            };

            // A panicking batch counts as failed trials; the shared context
            // is read-only, so siblings are unaffected.
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                solver.search_batch(
                    &task.header_digest,
                    &task.context,
                    &mut decoder,
                    &mut *nonces,
                    batch,
                )
            }));
            trial_count.fetch_add(batch, Ordering::Relaxed);

            match result {
                Ok(Ok(Some(outcome))) => {
                    info!(
                        worker_id = id,
                        task_id = task.id,
                        nonce = outcome.nonce,
                        "Found valid solution!"
                    );
                    return Some(WorkerEvent::Found(FoundSolution {
                        outcome,
                        task_id: task.id,
                        worker_id: id,
                    }));
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(worker_id = id, error = %e, "Trial batch failed");
                }
                Err(_) => {
                    warn!(worker_id = id, "Trial batch panicked, discarding it");
                    decoder = BeliefPropagationDecoder::new(&task.context.graph);
                }
            }
        }
    }

    /// Block until the task changes or the worker is stopped.
    fn wait_for_new_work(task_rx: &watch::Receiver<Option<MiningTask>>, running: &AtomicBool) {
        while running.load(Ordering::Relaxed) {
            match task_rx.has_changed() {
                Ok(true) => return,
                Ok(false) => thread::sleep(IDLE_POLL_INTERVAL),
                // Sender gone: nothing will ever arrive
                Err(_) => {
                    running.store(false, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    /// Stop the worker.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Check if the worker is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the current trial count.
    pub fn trial_count(&self) -> u64 {
        self.trial_count.load(Ordering::Relaxed)
    }

    /// Reset the trial counter and return the previous value.
    pub fn reset_trial_count(&self) -> u64 {
        self.trial_count.swap(0, Ordering::Relaxed)
    }

    /// Wait for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.join()
        } else {
            Ok(())
        }
    }
}

impl Drop for MiningWorker {
    fn drop(&mut self) {
        self.stop();
        // Note: We don't join here to avoid blocking in drop
    }
}

/// A pool of mining workers.
pub struct WorkerPool {
    /// Workers in the pool.
    workers: Vec<MiningWorker>,
    /// Task sender to broadcast work to all workers.
    task_tx: watch::Sender<Option<MiningTask>>,
    /// Event receiver.
    event_rx: mpsc::Receiver<WorkerEvent>,
    /// Running flag.
    running: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Create a new worker pool with the specified number of workers.
    pub fn new(num_workers: usize) -> std::io::Result<Self> {
        let num_workers = num_workers.max(1);
        let (task_tx, task_rx) = watch::channel(None);
        let (event_tx, event_rx) = mpsc::channel(num_workers * 2);
        let running = Arc::new(AtomicBool::new(true));

        let mut workers = Vec::with_capacity(num_workers);
        for id in 0..num_workers {
            let worker = MiningWorker::spawn(id, task_rx.clone(), event_tx.clone())?;
            workers.push(worker);
        }

        info!(num_workers = num_workers, "Worker pool created");

        Ok(Self {
            workers,
            task_tx,
            event_rx,
            running,
        })
    }

    /// Broadcast a new mining task to all workers.
    pub fn broadcast_task(&self, task: MiningTask) {
        if self.task_tx.send(Some(task)).is_err() {
            warn!("Failed to broadcast task, no workers subscribed");
        }
    }

    /// Clear the current task (workers will idle).
    pub fn clear_task(&self) {
        let _ = self.task_tx.send(None);
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv_event(&mut self) -> Option<WorkerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (async).
    pub async fn recv_event(&mut self) -> Option<WorkerEvent> {
        self.event_rx.recv().await
    }

    /// Get the total trial count across all workers.
    pub fn total_trial_count(&self) -> u64 {
        self.workers.iter().map(|w| w.trial_count()).sum()
    }

    /// Reset all trial counters and return the total.
    pub fn reset_trial_counts(&self) -> u64 {
        self.workers.iter().map(|w| w.reset_trial_count()).sum()
    }

    /// Get the number of workers.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Check if the pool is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop all workers.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        for worker in &self.workers {
            worker.stop();
        }
    }

    /// Shutdown the pool and wait for all workers to finish.
    pub fn shutdown(self) {
        self.stop();
        for worker in self.workers {
            let _ = worker.join();
        }
        info!("Worker pool shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eccpow_consensus::{DifficultyLevel, DifficultyTable};
    use std::collections::HashSet;

    /// Context whose weight window can never be met.
    fn unreachable_context() -> Arc<PowContext> {
        let level = DifficultyLevel {
            decision_from: 34,
            decision_to: 34,
            decision_step: 1,
            ..*DifficultyTable::reference().level(0).unwrap()
        };
        Arc::new(PowContext::new(level, 0).unwrap())
    }

    fn level0_context() -> Arc<PowContext> {
        let level = *DifficultyTable::reference().level(0).unwrap();
        Arc::new(PowContext::new(level, 0).unwrap())
    }

    #[test]
    fn test_claim_batch_respects_budget() {
        let task = MiningTask::new(1, vec![0u8; 32], unreachable_context(), 10, 4);
        assert_eq!(task.claim_batch(), Some(4));
        assert_eq!(task.claim_batch(), Some(4));
        assert_eq!(task.claim_batch(), Some(2));
        assert_eq!(task.claim_batch(), None);
        assert_eq!(task.claim_batch(), None);
    }

    #[tokio::test]
    async fn test_worker_pool_creation() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.num_workers(), 2);
        assert!(pool.is_running());
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_every_worker_reports_exhaustion() {
        let mut pool = WorkerPool::new(3).unwrap();
        let task = MiningTask::new(7, vec![1u8; 32], unreachable_context(), 24, 4);
        pool.broadcast_task(task);

        let mut exhausted = HashSet::new();
        while exhausted.len() < 3 {
            let event = tokio::time::timeout(Duration::from_secs(30), pool.recv_event())
                .await
                .expect("workers should report within the timeout")
                .expect("event channel open");
            match event {
                WorkerEvent::Exhausted { task_id, worker_id } => {
                    assert_eq!(task_id, 7);
                    exhausted.insert(worker_id);
                }
                WorkerEvent::Found(_) => panic!("unreachable window cannot be met"),
            }
        }

        assert_eq!(pool.total_trial_count(), 24);
        pool.shutdown();
    }

    #[tokio::test]
    async fn test_worker_finds_solution() {
        let mut pool = WorkerPool::new(2).unwrap();
        let context = level0_context();
        let header = vec![0x42u8; 32];
        pool.broadcast_task(MiningTask::new(
            1,
            header.clone(),
            Arc::clone(&context),
            100_000,
            16,
        ));

        let event = tokio::time::timeout(Duration::from_secs(60), pool.recv_event()).await;
        pool.clear_task();

        match event.expect("should find a solution within the timeout") {
            Some(WorkerEvent::Found(found)) => {
                assert!(found.outcome.accepted);
                assert!(EccpowSolver::new().verify(&header, &context, &found.outcome));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_worker_task_switching() {
        let pool = WorkerPool::new(1).unwrap();

        pool.broadcast_task(MiningTask::new(
            1,
            vec![0u8; 32],
            unreachable_context(),
            u64::MAX,
            8,
        ));
        tokio::time::sleep(Duration::from_millis(100)).await;

        pool.broadcast_task(MiningTask::new(
            2,
            vec![1u8; 32],
            unreachable_context(),
            u64::MAX,
            8,
        ));
        assert!(pool.is_running());

        pool.shutdown();
    }

    #[tokio::test]
    async fn test_trial_counting() {
        let pool = WorkerPool::new(1).unwrap();
        pool.broadcast_task(MiningTask::new(
            1,
            vec![0u8; 32],
            unreachable_context(),
            u64::MAX,
            8,
        ));

        tokio::time::sleep(Duration::from_secs(1)).await;

        let trials = pool.total_trial_count();
        assert!(trials > 0, "Should have run some trials, got {}", trials);
        assert!(pool.reset_trial_counts() >= trials);

        pool.shutdown();
    }

    #[test]
    fn test_worker_stop() {
        let (task_tx, task_rx) = watch::channel(None);
        let (event_tx, _event_rx) = mpsc::channel(10);

        let worker = MiningWorker::spawn(0, task_rx, event_tx).unwrap();
        assert!(worker.is_running());

        worker.stop();
        assert!(!worker.is_running());
        worker.join().unwrap();
        drop(task_tx);
    }
}
