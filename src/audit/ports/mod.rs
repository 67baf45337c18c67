//! Port contracts for the audit trail.

pub mod log;

pub use log::{AppendOutcome, AuditLog, AuditLogError, AuditLogResult};
