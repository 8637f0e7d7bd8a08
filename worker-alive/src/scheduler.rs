use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of purging an instance's heartbeat queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct PurgeStats {
    pub purged_jobs: usize,
}

/// The slice of the host job-queue system this crate depends on. The queue
/// system itself lives outside this crate; these are the capabilities the
/// lifecycle coordinator calls into.
#[async_trait]
pub trait JobScheduler {
    /// Make `queue` a processing queue, inserted ahead of every other
    /// configured queue so heartbeat jobs are never starved by backlog.
    async fn install_queue(&self, queue: &str) -> Result<(), SchedulerError>;

    /// Schedule the recurring heartbeat job for `hostname` on `queue`.
    async fn enqueue(&self, queue: &str, hostname: &str) -> Result<(), SchedulerError>;

    /// Delete all pending and scheduled heartbeat jobs on `queue` and remove
    /// the queue itself.
    async fn purge_queue(&self, queue: &str) -> Result<PurgeStats, SchedulerError>;
}

#[derive(Default)]
struct SchedulerState {
    queues: Vec<String>,
    jobs: HashMap<String, Vec<String>>,
    fail_purge: bool,
}

/// In-process scheduler. The binary drives heartbeat ticks itself, so this
/// only has to keep the queue bookkeeping honest; it doubles as the test
/// stand-in for the host job-queue system.
#[derive(Clone, Default)]
pub struct MemoryScheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl MemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queues(queues: Vec<String>) -> Self {
        let scheduler = Self::default();
        scheduler.lock().queues = queues;
        scheduler
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn queues(&self) -> Vec<String> {
        self.lock().queues.clone()
    }

    pub fn pending(&self, queue: &str) -> usize {
        self.lock().jobs.get(queue).map_or(0, Vec::len)
    }

    /// Make the next purge fail, to exercise best-effort cleanup paths.
    pub fn fail_purge(&self, fail: bool) {
        self.lock().fail_purge = fail;
    }
}

#[async_trait]
impl JobScheduler for MemoryScheduler {
    async fn install_queue(&self, queue: &str) -> Result<(), SchedulerError> {
        let mut state = self.lock();
        state.queues.retain(|q| q != queue);
        state.queues.insert(0, queue.to_string());
        Ok(())
    }

    async fn enqueue(&self, queue: &str, hostname: &str) -> Result<(), SchedulerError> {
        self.lock()
            .jobs
            .entry(queue.to_string())
            .or_default()
            .push(hostname.to_string());
        Ok(())
    }

    async fn purge_queue(&self, queue: &str) -> Result<PurgeStats, SchedulerError> {
        let mut state = self.lock();
        if state.fail_purge {
            return Err(SchedulerError::Unavailable("purge failed".to_string()));
        }

        let purged_jobs = state.jobs.remove(queue).map_or(0, |jobs| jobs.len());
        state.queues.retain(|q| q != queue);

        Ok(PurgeStats { purged_jobs })
    }
}
