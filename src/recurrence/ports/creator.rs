//! Port through which the engine creates the next task occurrence.

use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

use crate::task::domain::{EventSource, OwnerId, Task};
use crate::task::ports::{EventBus, ReminderTimer, TaskRepository};
use crate::task::services::{CreateTaskRequest, TaskStoreService};

/// Result type for next-occurrence creation.
pub type TaskCreatorResult<T> = Result<T, TaskCreatorError>;

/// Error returned when the next occurrence could not be created.
///
/// Treated as retryable by the engine: the completion event stays
/// unacknowledged and is redelivered, and the dedup ledger is only
/// written after a successful creation.
#[derive(Debug, Clone, Error)]
#[error("next occurrence creation failed: {0}")]
pub struct TaskCreatorError(Arc<dyn std::error::Error + Send + Sync>);

impl TaskCreatorError {
    /// Wraps the underlying creation failure.
    pub fn new(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Arc::new(err))
    }
}

/// Creation contract the engine regenerates tasks through.
#[async_trait]
pub trait TaskCreator: Send + Sync {
    /// Creates a task for the owner, attributed to the recurrence path.
    ///
    /// # Errors
    ///
    /// Returns [`TaskCreatorError`] when the task could not be created;
    /// the caller treats this as retryable.
    async fn create(
        &self,
        owner_id: OwnerId,
        request: CreateTaskRequest,
    ) -> TaskCreatorResult<Task>;
}

#[async_trait]
impl<R, B, T, C> TaskCreator for TaskStoreService<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus + 'static,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    async fn create(
        &self,
        owner_id: OwnerId,
        request: CreateTaskRequest,
    ) -> TaskCreatorResult<Task> {
        Self::create(self, owner_id, request, EventSource::Recurrence)
            .await
            .map_err(TaskCreatorError::new)
    }
}
