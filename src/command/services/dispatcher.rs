//! Maps structured commands onto the task store.

use mockable::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::command::domain::{Command, CommandOutcome};
use crate::task::domain::{EventSource, OwnerId, Task, TaskId, TaskPatch};
use crate::task::ports::{EventBus, ReminderTimer, TaskRepository, TaskRepositoryError};
use crate::task::services::{TaskStoreError, TaskStoreService};

/// Errors returned by command dispatch.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The underlying store operation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
}

/// Result type for command dispatch.
pub type CommandResult<T> = Result<T, CommandError>;

/// Direction of a tag mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagOp {
    Add,
    Remove,
}

/// Exhaustive dispatcher from commands to task store operations.
///
/// Conversational clients do not carry optimistic-concurrency versions,
/// so mutating commands resolve the current version with a read and
/// retry a stale-version conflict once before surfacing it.
#[derive(Clone)]
pub struct CommandDispatcher<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus + 'static,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    store: Arc<TaskStoreService<R, B, T, C>>,
}

impl<R, B, T, C> CommandDispatcher<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus + 'static,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    /// Creates a dispatcher over the given store.
    #[must_use]
    pub const fn new(store: Arc<TaskStoreService<R, B, T, C>>) -> Self {
        Self { store }
    }

    /// Executes one command on behalf of the owner.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Store`] when the underlying operation
    /// fails after conflict retry.
    pub async fn dispatch(
        &self,
        owner_id: &OwnerId,
        command: Command,
    ) -> CommandResult<CommandOutcome> {
        match command {
            Command::Create(request) => {
                let task = self
                    .store
                    .create(owner_id.clone(), request, EventSource::Chat)
                    .await?;
                Ok(CommandOutcome::Created(task))
            }
            Command::Update { task_id, patch } => {
                let task = self.update_with_retry(owner_id, task_id, &patch).await?;
                Ok(CommandOutcome::Updated(task))
            }
            Command::Complete { task_id } => {
                let task = self.complete_with_retry(owner_id, task_id).await?;
                Ok(CommandOutcome::Completed(task))
            }
            Command::Delete { task_id } => {
                self.delete_with_retry(owner_id, task_id).await?;
                Ok(CommandOutcome::Deleted(task_id))
            }
            Command::List(filter) => {
                let page = self.store.list(owner_id, &filter).await?;
                Ok(CommandOutcome::Tasks(page))
            }
            Command::Search {
                query,
                page,
                page_size,
            } => {
                let result = self.store.search(owner_id, query, page, page_size).await?;
                Ok(CommandOutcome::Tasks(result))
            }
            Command::AddTags { task_id, tags } => {
                let task = self
                    .retag_with_retry(owner_id, task_id, &tags, TagOp::Add)
                    .await?;
                Ok(CommandOutcome::Updated(task))
            }
            Command::RemoveTags { task_id, tags } => {
                let task = self
                    .retag_with_retry(owner_id, task_id, &tags, TagOp::Remove)
                    .await?;
                Ok(CommandOutcome::Updated(task))
            }
        }
    }

    /// Reads the current task, failing when it does not exist.
    async fn fetch(&self, owner_id: &OwnerId, task_id: TaskId) -> CommandResult<Task> {
        let task = self
            .store
            .find(owner_id, task_id)
            .await?
            .ok_or(TaskStoreError::Repository(TaskRepositoryError::NotFound(
                task_id,
            )))?;
        Ok(task)
    }

    async fn update_with_retry(
        &self,
        owner_id: &OwnerId,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> CommandResult<Task> {
        let mut retried = false;
        loop {
            let current = self.fetch(owner_id, task_id).await?;
            let result = self
                .store
                .update(
                    owner_id,
                    task_id,
                    current.version(),
                    patch.clone(),
                    EventSource::Chat,
                )
                .await;
            match result {
                Ok(task) => return Ok(task),
                Err(err) if is_conflict(&err) && !retried => retried = true,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn complete_with_retry(
        &self,
        owner_id: &OwnerId,
        task_id: TaskId,
    ) -> CommandResult<Task> {
        let mut retried = false;
        loop {
            let current = self.fetch(owner_id, task_id).await?;
            let result = self
                .store
                .complete(owner_id, task_id, current.version(), EventSource::Chat)
                .await;
            match result {
                Ok(task) => return Ok(task),
                Err(err) if is_conflict(&err) && !retried => retried = true,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn delete_with_retry(&self, owner_id: &OwnerId, task_id: TaskId) -> CommandResult<()> {
        let mut retried = false;
        loop {
            let current = self.fetch(owner_id, task_id).await?;
            let result = self
                .store
                .delete(owner_id, task_id, current.version(), EventSource::Chat)
                .await;
            match result {
                Ok(()) => return Ok(()),
                Err(err) if is_conflict(&err) && !retried => retried = true,
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn retag_with_retry(
        &self,
        owner_id: &OwnerId,
        task_id: TaskId,
        tags: &[String],
        op: TagOp,
    ) -> CommandResult<Task> {
        let mut retried = false;
        loop {
            let current = self.fetch(owner_id, task_id).await?;
            let mut next_tags: BTreeSet<String> = current.tags().clone();
            match op {
                TagOp::Add => next_tags.extend(tags.iter().cloned()),
                TagOp::Remove => next_tags.retain(|tag| !tags.contains(tag)),
            }
            let patch = TaskPatch::new().with_tags(next_tags);
            let result = self
                .store
                .update(owner_id, task_id, current.version(), patch, EventSource::Chat)
                .await;
            match result {
                Ok(task) => return Ok(task),
                Err(err) if is_conflict(&err) && !retried => retried = true,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Returns `true` for a stale-version conflict worth one retry.
const fn is_conflict(err: &TaskStoreError) -> bool {
    matches!(
        err,
        TaskStoreError::Repository(TaskRepositoryError::VersionConflict { .. })
    )
}
