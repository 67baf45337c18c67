//! Error types for task domain validation and state transitions.

use super::ids::TaskId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The owner identifier is empty.
    #[error("owner identifier must not be empty")]
    EmptyOwnerId,

    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// The task title exceeds the maximum length.
    #[error("task title is {0} characters, maximum is 500")]
    TitleTooLong(usize),

    /// The task description exceeds the maximum length.
    #[error("task description is {0} characters, maximum is 2000")]
    DescriptionTooLong(usize),

    /// The reminder would fire after the due date.
    #[error("reminder at {remind_at} is after the due date {due_at}")]
    ReminderAfterDue {
        /// Requested reminder time.
        remind_at: DateTime<Utc>,
        /// Requested due time.
        due_at: DateTime<Utc>,
    },

    /// A recurrence rule was supplied without a due date to advance from.
    #[error("a recurring task requires a due date")]
    RecurrenceWithoutDueDate,
}

/// Error returned when completing a task that is already completed.
///
/// This is an expected race between concurrent clients and is resolved as
/// an idempotent no-op by callers, distinct from a hard failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("task already completed: {0}")]
pub struct AlreadyCompleted(pub TaskId);
