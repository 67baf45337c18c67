//! Repository port for task persistence with optimistic versioning.

use crate::task::domain::{OwnerId, Task, TaskFilter, TaskId, TaskVersion};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract backed by the external state store.
///
/// Every mutating operation is a compare-and-swap on the task's version
/// counter, so concurrent writers to the same task are serialized and
/// stale writers receive [`TaskRepositoryError::VersionConflict`].
/// Different tasks never contend with each other.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID
    /// already exists.
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Replaces a stored task if its stored version equals
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not
    /// exist (or belongs to another owner) and
    /// [`TaskRepositoryError::VersionConflict`] when the stored version
    /// differs from the expected one.
    async fn update(&self, task: &Task, expected_version: TaskVersion)
    -> TaskRepositoryResult<()>;

    /// Removes a stored task if its stored version equals
    /// `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] or
    /// [`TaskRepositoryError::VersionConflict`] under the same rules as
    /// [`TaskRepository::update`].
    async fn delete(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
    ) -> TaskRepositoryResult<()>;

    /// Finds a task by owner and identifier.
    ///
    /// Returns `None` when the task does not exist or belongs to another
    /// owner.
    async fn find(&self, owner_id: &OwnerId, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns every task of the owner matching the filter's predicates,
    /// sorted according to the filter.
    ///
    /// Pagination is applied by the caller; the repository returns the
    /// full sorted match set so the caller can report a total count.
    async fn query(&self, owner_id: &OwnerId, filter: &TaskFilter)
    -> TaskRepositoryResult<Vec<Task>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found for the given owner.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The supplied version no longer matches the stored one.
    #[error("version conflict on task {task_id}: expected {expected}, stored {actual}")]
    VersionConflict {
        /// Task whose version check failed.
        task_id: TaskId,
        /// Version the caller supplied.
        expected: TaskVersion,
        /// Version currently stored.
        actual: TaskVersion,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
