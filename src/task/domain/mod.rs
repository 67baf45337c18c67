//! Domain model for the task lifecycle.
//!
//! The task domain models user-owned todo items with optimistic
//! versioning, reminder/due-date invariants, and optional recurrence
//! rules, plus the immutable lifecycle events emitted for every
//! successful mutation. Infrastructure concerns stay outside the domain
//! boundary.

mod error;
mod event;
mod filter;
mod ids;
mod patch;
mod recurrence;
mod task;

pub use error::{AlreadyCompleted, TaskDomainError};
pub use event::{EventId, EventKind, EventSource, LifecycleEvent, ReminderDueEvent};
pub use filter::{SortField, SortOrder, TaskFilter, TaskPage};
pub use ids::{OwnerId, TaskDescription, TaskId, TaskTitle, TaskVersion};
pub use patch::{PatchField, TaskPatch};
pub use recurrence::{RecurrencePattern, RecurrenceRule, advance};
pub use task::{NewTaskData, Priority, Task, TaskStatus};
