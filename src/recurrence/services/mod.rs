//! The recurrence engine service.

pub mod engine;

pub use engine::{CONSUMER_GROUP, RecurrenceEngine, RecurrenceError, RecurrenceResult};
