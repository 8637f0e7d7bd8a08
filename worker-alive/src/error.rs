use thiserror::Error;

use crate::redis::CustomRedisError;
use crate::scheduler::SchedulerError;

/// Errors surfaced on the startup path. Teardown-path failures are logged
/// and absorbed instead, so the worker can always terminate.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("store operation failed: {0}")]
    Store(#[from] CustomRedisError),
    #[error("failed to bind the probe listener: {0}")]
    ProbeBind(#[from] std::io::Error),
    #[error("job scheduler operation failed: {0}")]
    Scheduler(#[from] SchedulerError),
}
