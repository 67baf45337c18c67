//! Orchestration services for the task mutation path.

pub mod publisher;
pub mod reminder;
pub mod store;

pub use publisher::{EventPublisher, ParkedEvent, RetryPolicy};
pub use reminder::{ReminderFireError, ReminderFireResult, ReminderScheduler};
pub use store::{CreateTaskRequest, TaskStoreError, TaskStoreResult, TaskStoreService};
