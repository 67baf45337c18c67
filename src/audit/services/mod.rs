//! The audit recorder service.

pub mod recorder;

pub use recorder::{AuditError, AuditRecorder, AuditResult, CONSUMER_GROUP};
