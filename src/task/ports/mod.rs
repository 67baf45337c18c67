//! Port contracts for the task lifecycle's external collaborators.

pub mod event_bus;
pub mod repository;
pub mod timer;

pub use event_bus::{
    Delivery, DeliveryToken, EventBus, EventBusError, EventBusResult, Subscription,
    TOPIC_REMINDERS, TOPIC_TASK_EVENTS,
};
pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
pub use timer::{ReminderJob, ReminderTimer, TimerError, TimerResult};
