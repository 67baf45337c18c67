//! The closed set of operations a conversational client can request.

use crate::task::domain::{Task, TaskFilter, TaskId, TaskPage, TaskPatch};
use crate::task::services::CreateTaskRequest;

/// One fully-typed operation produced by the language collaborator.
///
/// The enum is deliberately closed: adding an operation means adding a
/// variant, and the dispatcher's exhaustive match keeps every variant
/// handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Create a task.
    Create(CreateTaskRequest),
    /// Patch an existing task's fields.
    Update {
        /// Task to update.
        task_id: TaskId,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Mark a task completed.
    Complete {
        /// Task to complete.
        task_id: TaskId,
    },
    /// Delete a task.
    Delete {
        /// Task to delete.
        task_id: TaskId,
    },
    /// List tasks with filtering, sorting, and pagination.
    List(TaskFilter),
    /// Free-text search over titles and descriptions.
    Search {
        /// Query text.
        query: String,
        /// 1-based page number.
        page: usize,
        /// Page size.
        page_size: usize,
    },
    /// Add tags to a task.
    AddTags {
        /// Task to tag.
        task_id: TaskId,
        /// Tags to add.
        tags: Vec<String>,
    },
    /// Remove tags from a task.
    RemoveTags {
        /// Task to untag.
        task_id: TaskId,
        /// Tags to remove.
        tags: Vec<String>,
    },
}

/// Result of a dispatched command, for the conversational layer to
/// phrase back to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// A task was created.
    Created(Task),
    /// A task was updated (including tag changes).
    Updated(Task),
    /// A task was completed.
    Completed(Task),
    /// A task was deleted.
    Deleted(TaskId),
    /// A page of matching tasks.
    Tasks(TaskPage),
}
