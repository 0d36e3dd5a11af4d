//! Error taxonomy for the Trigger Manager, Schedule Manager, and Result
//! Cache (spec §7).

use nebula_core::{ExecutionId, TriggerId, WorkflowId};
use thiserror::Error;

/// Errors the admission-control and scheduling layers can produce.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// The workflow is inactive or the request was already cancelled.
    #[error("workflow {0} is not active")]
    NotActive(WorkflowId),

    /// Every applicable concurrency cap was full and the conflict policy
    /// is `reject`.
    #[error("concurrency limit reached")]
    ConcurrencyLimit,

    /// The request waited in the priority queue past `queueTimeout`.
    #[error("queue timeout exceeded")]
    QueueTimeout,

    /// `executeTriggerAndWait` exceeded its caller-supplied timeout.
    #[error("execution timed out")]
    Timeout,

    /// A 5-field cron expression failed validation on registration.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// The Result Cache backend could not be reached; degrades rather
    /// than failing the caller (spec §4.5).
    #[error("result cache unavailable: {0}")]
    CacheUnavailable(String),

    /// No such active execution to cancel.
    #[error("execution {0} is not active")]
    UnknownExecution(ExecutionId),

    /// No such registered trigger.
    #[error("trigger {0} not found")]
    UnknownTrigger(TriggerId),

    /// The underlying Flow Execution Engine reported a planning failure.
    #[error("engine error: {0}")]
    Engine(String),
}

impl From<nebula_engine::EngineError> for ApiError {
    fn from(error: nebula_engine::EngineError) -> Self {
        Self::Engine(error.to_string())
    }
}
