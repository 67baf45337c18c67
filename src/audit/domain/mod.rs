//! Domain types for the audit trail.

mod entry;

pub use entry::{AuditEntry, AuditEntryId, AuditPage, AuditQuery, FieldChange, SnapshotDiff};
