//! Timer service port for scheduled reminder jobs.

use crate::task::domain::{OwnerId, Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for timer service operations.
pub type TimerResult<T> = Result<T, TimerError>;

/// Payload registered with the external timer service.
///
/// The task id doubles as the job key, so at most one job exists per task
/// and re-scheduling replaces the previous job. The payload is handed
/// back verbatim when the job fires and is re-validated against current
/// task state at that point; it is never trusted as ground truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    /// Task the reminder belongs to; also the job key.
    pub task_id: TaskId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Task title for notification display.
    pub title: String,
    /// Task due date, if any.
    pub due_at: Option<DateTime<Utc>>,
    /// The instant the job fires at.
    pub remind_at: DateTime<Utc>,
}

impl ReminderJob {
    /// Builds the job for a task's current reminder.
    ///
    /// Returns `None` when the task has no reminder set.
    #[must_use]
    pub fn for_task(task: &Task) -> Option<Self> {
        task.remind_at().map(|remind_at| Self {
            task_id: task.id(),
            owner_id: task.owner_id().clone(),
            title: task.title().as_str().to_owned(),
            due_at: task.due_at(),
            remind_at,
        })
    }
}

/// External timer/job service contract.
///
/// The service fires each scheduled job at-or-after its `remind_at`,
/// at-least-once; duplicated or late firings are resolved by the caller's
/// re-validation at firing time.
#[async_trait]
pub trait ReminderTimer: Send + Sync {
    /// Schedules (or replaces) the job keyed by the payload's task id.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Unavailable`] when the service cannot accept
    /// the job; callers surface this as a retryable failure.
    async fn schedule(&self, job: ReminderJob) -> TimerResult<()>;

    /// Cancels the job keyed by the task id.
    ///
    /// Cancelling a job that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Unavailable`] when the service cannot be
    /// reached; a job that outlives a failed cancel is neutralized by
    /// re-validation when it fires.
    async fn cancel(&self, task_id: TaskId) -> TimerResult<()>;
}

/// Errors returned by timer service implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The timer service is temporarily unable to accept the request.
    #[error("timer service unavailable: {0}")]
    Unavailable(String),
}
