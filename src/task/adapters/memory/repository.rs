//! Thread-safe in-memory task repository with version compare-and-swap.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{OwnerId, SortField, SortOrder, Task, TaskFilter, TaskId, TaskVersion},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored tasks across all owners.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the backing lock
    /// is poisoned.
    pub fn len(&self) -> TaskRepositoryResult<usize> {
        Ok(read_state(&self.state)?.len())
    }

    /// Returns `true` when no task is stored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::Persistence`] when the backing lock
    /// is poisoned.
    pub fn is_empty(&self) -> TaskRepositoryResult<bool> {
        Ok(read_state(&self.state)?.is_empty())
    }
}

fn read_state(
    state: &Arc<RwLock<HashMap<TaskId, Task>>>,
) -> TaskRepositoryResult<std::sync::RwLockReadGuard<'_, HashMap<TaskId, Task>>> {
    state
        .read()
        .map_err(|err| TaskRepositoryError::persistence(std::io::Error::other(err.to_string())))
}

fn write_state(
    state: &Arc<RwLock<HashMap<TaskId, Task>>>,
) -> TaskRepositoryResult<std::sync::RwLockWriteGuard<'_, HashMap<TaskId, Task>>> {
    state
        .write()
        .map_err(|err| TaskRepositoryError::persistence(std::io::Error::other(err.to_string())))
}

/// Verifies that the stored task belongs to the owner and carries the
/// version the caller read.
fn check_stored(
    stored: Option<&Task>,
    owner_id: &OwnerId,
    id: TaskId,
    expected_version: TaskVersion,
) -> TaskRepositoryResult<()> {
    let current = stored
        .filter(|task| task.owner_id() == owner_id)
        .ok_or(TaskRepositoryError::NotFound(id))?;
    if current.version() != expected_version {
        return Err(TaskRepositoryError::VersionConflict {
            task_id: id,
            expected: expected_version,
            actual: current.version(),
        });
    }
    Ok(())
}

fn compare_due_at(
    a: Option<chrono::DateTime<chrono::Utc>>,
    b: Option<chrono::DateTime<chrono::Utc>>,
    order: SortOrder,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match order {
            SortOrder::Asc => x.cmp(&y),
            SortOrder::Desc => y.cmp(&x),
        },
        // Tasks without a due date sort last in either direction.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sort_tasks(tasks: &mut [Task], sort_by: SortField, order: SortOrder) {
    match sort_by {
        SortField::CreatedAt => {
            tasks.sort_by_key(Task::created_at);
            if order == SortOrder::Desc {
                tasks.reverse();
            }
        }
        SortField::Priority => {
            tasks.sort_by_key(|task| task.priority().rank());
            if order == SortOrder::Desc {
                tasks.reverse();
            }
        }
        SortField::DueAt => {
            tasks.sort_by(|a, b| compare_due_at(a.due_at(), b.due_at(), order));
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn insert(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = write_state(&self.state)?;
        if state.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(
        &self,
        task: &Task,
        expected_version: TaskVersion,
    ) -> TaskRepositoryResult<()> {
        let mut state = write_state(&self.state)?;
        check_stored(
            state.get(&task.id()),
            task.owner_id(),
            task.id(),
            expected_version,
        )?;
        state.insert(task.id(), task.clone());
        Ok(())
    }

    async fn delete(
        &self,
        owner_id: &OwnerId,
        id: TaskId,
        expected_version: TaskVersion,
    ) -> TaskRepositoryResult<()> {
        let mut state = write_state(&self.state)?;
        check_stored(state.get(&id), owner_id, id, expected_version)?;
        state.remove(&id);
        Ok(())
    }

    async fn find(&self, owner_id: &OwnerId, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = read_state(&self.state)?;
        Ok(state
            .get(&id)
            .filter(|task| task.owner_id() == owner_id)
            .cloned())
    }

    async fn query(
        &self,
        owner_id: &OwnerId,
        filter: &TaskFilter,
    ) -> TaskRepositoryResult<Vec<Task>> {
        let state = read_state(&self.state)?;
        let mut matches: Vec<Task> = state
            .values()
            .filter(|task| task.owner_id() == owner_id && filter.matches(task))
            .cloned()
            .collect();
        drop(state);
        sort_tasks(&mut matches, filter.sort_by, filter.sort_order);
        Ok(matches)
    }
}
