use thiserror::Error;

/// Errors raised while building or tearing down a [`WorkerPool`](crate::WorkerPool).
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Thread setup error: {0}")]
    ThreadSetup(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a unit can be refused by the queue.
///
/// None of these are fatal: the fork/join scheduler treats every variant as
/// "run it on this thread instead".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Work queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },
    #[error("Unit has no executable or was already submitted")]
    InvalidUnit,
    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

/// Errors returned when waiting on a unit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwaitError {
    #[error("Unit has no executable")]
    InvalidUnit,
    #[error("Unit was never submitted to a pool")]
    NotSubmitted,
    #[error("Unit panicked: {0}")]
    Panicked(String),
    #[error("Unit output was already taken")]
    OutputTaken,
}

/// Render a panic payload the way worker logs and [`AwaitError::Panicked`] show it.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
