//! Task store service: the single mutation path for tasks.
//!
//! Every successful mutation persists through the repository's version
//! compare-and-swap, emits exactly one lifecycle event, and brings the
//! reminder schedule in line, in that order. Event delivery is never
//! awaited and a committed mutation is never rolled back; the one
//! external call made synchronously is reminder scheduling, so a timer
//! outage surfaces to the caller as a retryable error instead of a
//! dropped reminder.

use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::task::domain::{
    AlreadyCompleted, EventKind, EventSource, NewTaskData, OwnerId, Priority, RecurrenceRule, Task,
    TaskDescription, TaskDomainError, TaskFilter, TaskId, TaskPage, TaskPatch, TaskTitle,
    TaskVersion,
};
use crate::task::ports::{EventBus, ReminderTimer, TaskRepository, TaskRepositoryError, TimerError};
use crate::task::services::publisher::EventPublisher;
use crate::task::services::reminder::ReminderScheduler;

/// Request payload for creating a task from unvalidated input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    priority: Priority,
    tags: Vec<String>,
    due_at: Option<DateTime<Utc>>,
    remind_at: Option<DateTime<Utc>>,
    recurrence: Option<RecurrenceRule>,
}

impl CreateTaskRequest {
    /// Creates a request with the required title.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            tags: Vec::new(),
            due_at: None,
            remind_at: None,
            recurrence: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the initial tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    /// Sets the reminder time.
    #[must_use]
    pub const fn with_remind_at(mut self, remind_at: DateTime<Utc>) -> Self {
        self.remind_at = Some(remind_at);
        self
    }

    /// Sets the recurrence rule.
    #[must_use]
    pub const fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }

    /// Validates the request into domain task data.
    fn into_data(self) -> Result<NewTaskData, TaskDomainError> {
        let title = TaskTitle::new(self.title)?;
        let description = self.description.map(TaskDescription::new).transpose()?;
        Ok(NewTaskData {
            title,
            description,
            priority: self.priority,
            tags: self.tags.into_iter().collect::<BTreeSet<_>>(),
            due_at: self.due_at,
            remind_at: self.remind_at,
            recurrence: self.recurrence,
        })
    }
}

/// Service-level errors for task store operations.
#[derive(Debug, Error)]
pub enum TaskStoreError {
    /// Domain validation failed; never retried.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Repository operation failed (not-found, version conflict, or
    /// persistence failure).
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// The task is already completed; an expected race resolved as an
    /// idempotent no-op, with no new event emitted.
    #[error(transparent)]
    AlreadyCompleted(#[from] AlreadyCompleted),

    /// Reminder scheduling could not reach the timer service. The
    /// mutation itself is durable and its event queued; the caller
    /// retries to establish the reminder.
    #[error(transparent)]
    ReminderSchedule(#[from] TimerError),
}

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Authoritative mutation path for tasks.
#[derive(Clone)]
pub struct TaskStoreService<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus + 'static,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    publisher: Arc<EventPublisher<B, C>>,
    reminders: Arc<ReminderScheduler<R, B, T, C>>,
    clock: Arc<C>,
}

impl<R, B, T, C> TaskStoreService<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus + 'static,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    /// Creates a task store service.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        publisher: Arc<EventPublisher<B, C>>,
        reminders: Arc<ReminderScheduler<R, B, T, C>>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            publisher,
            reminders,
            clock,
        }
    }

    /// Creates a new task at version 1 and emits a `created` event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Domain`] on validation failure,
    /// [`TaskStoreError::Repository`] when persistence fails, and
    /// [`TaskStoreError::ReminderSchedule`] when the task was stored (and
    /// its event queued) but the reminder could not be scheduled.
    pub async fn create(
        &self,
        owner_id: OwnerId,
        request: CreateTaskRequest,
        source: EventSource,
    ) -> TaskStoreResult<Task> {
        let data = request.into_data()?;
        let task = Task::create(owner_id, data, &*self.clock)?;
        self.repository.insert(&task).await?;
        self.publisher.publish(&task, EventKind::Created, source);
        self.reminders.sync(&task).await?;
        tracing::info!(
            task_id = %task.id(),
            owner_id = %task.owner_id(),
            source = %source,
            "task_created"
        );
        Ok(task)
    }

    /// Applies a field patch against the version the caller read and
    /// emits a single `updated` event with the full new snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] for an unknown task,
    /// [`TaskRepositoryError::VersionConflict`] for a stale version (the
    /// caller re-reads and retries), [`TaskStoreError::Domain`] when the
    /// patch violates an invariant, and
    /// [`TaskStoreError::ReminderSchedule`] when the reminder could not
    /// be re-synced.
    pub async fn update(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
        patch: TaskPatch,
        source: EventSource,
    ) -> TaskStoreResult<Task> {
        let mut task = self.fetch_at_version(owner_id, id, expected_version).await?;
        task.apply_patch(patch, &*self.clock)?;
        self.repository.update(&task, expected_version).await?;
        self.publisher.publish(&task, EventKind::Updated, source);
        self.reminders.sync(&task).await?;
        tracing::info!(
            task_id = %id,
            owner_id = %owner_id,
            source = %source,
            "task_updated"
        );
        Ok(task)
    }

    /// Marks a task completed and emits a `completed` event.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::AlreadyCompleted`] when the task is
    /// already completed (idempotent no-op, no event emitted), plus the
    /// not-found and version-conflict failures of [`Self::update`].
    pub async fn complete(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
        source: EventSource,
    ) -> TaskStoreResult<Task> {
        let mut task = self.fetch_at_version(owner_id, id, expected_version).await?;
        task.complete(&*self.clock)?;
        self.repository.update(&task, expected_version).await?;
        self.publisher.publish(&task, EventKind::Completed, source);
        // Best-effort: a cancel that fails (or loses the race with the
        // timer) is resolved by re-validation at firing time.
        self.reminders.cancel(id).await;
        tracing::info!(
            task_id = %id,
            owner_id = %owner_id,
            source = %source,
            "task_completed"
        );
        Ok(task)
    }

    /// Deletes a task and emits a `deleted` event carrying the final
    /// snapshot.
    ///
    /// # Errors
    ///
    /// Returns the not-found and version-conflict failures of
    /// [`Self::update`].
    pub async fn delete(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
        source: EventSource,
    ) -> TaskStoreResult<()> {
        let task = self.fetch_at_version(owner_id, id, expected_version).await?;
        self.repository.delete(owner_id, id, expected_version).await?;
        self.publisher.publish(&task, EventKind::Deleted, source);
        self.reminders.cancel(id).await;
        tracing::info!(
            task_id = %id,
            owner_id = %owner_id,
            source = %source,
            "task_deleted"
        );
        Ok(())
    }

    /// Finds a task by owner and identifier.
    ///
    /// Returns `Ok(None)` when the task does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Repository`] when the lookup fails.
    pub async fn find(&self, owner_id: &OwnerId, id: TaskId) -> TaskStoreResult<Option<Task>> {
        Ok(self.repository.find(owner_id, id).await?)
    }

    /// Lists the owner's tasks with filtering, sorting, and pagination.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Repository`] when the query fails.
    pub async fn list(&self, owner_id: &OwnerId, filter: &TaskFilter) -> TaskStoreResult<TaskPage> {
        let matches = self.repository.query(owner_id, filter).await?;
        let total = matches.len();
        let start = filter.page.saturating_sub(1).saturating_mul(filter.page_size);
        let tasks = matches
            .into_iter()
            .skip(start)
            .take(filter.page_size)
            .collect();
        Ok(TaskPage {
            tasks,
            total,
            page: filter.page,
            page_size: filter.page_size,
        })
    }

    /// Free-text search over titles and descriptions.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::Repository`] when the query fails.
    pub async fn search(
        &self,
        owner_id: &OwnerId,
        query: impl Into<String> + Send,
        page: usize,
        page_size: usize,
    ) -> TaskStoreResult<TaskPage> {
        let filter = TaskFilter::new()
            .with_search(query)
            .paginated(page, page_size);
        self.list(owner_id, &filter).await
    }

    /// Fetches a task and fails fast when the caller's version is stale.
    async fn fetch_at_version(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
    ) -> TaskStoreResult<Task> {
        let task = self
            .repository
            .find(owner_id, id)
            .await?
            .ok_or(TaskRepositoryError::NotFound(id))?;
        if task.version() != expected_version {
            return Err(TaskRepositoryError::VersionConflict {
                task_id: id,
                expected: expected_version,
                actual: task.version(),
            }
            .into());
        }
        Ok(task)
    }
}
