//! Append-only audit log port.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::audit::domain::{AuditEntry, AuditPage, AuditQuery};
use crate::task::domain::TaskId;

/// Result type for audit log operations.
pub type AuditLogResult<T> = Result<T, AuditLogError>;

/// Outcome of an idempotent append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The entry was appended.
    Recorded,
    /// An entry with the same source event id already exists; nothing
    /// was written.
    Duplicate,
}

/// Append-only persistence contract for audit entries.
///
/// Entries are never mutated or deleted. Appending is idempotent on the
/// entry's source event id, which is how redelivered events collapse to
/// a single record.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends an entry unless its source event id was already recorded.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Persistence`] when the entry could not
    /// be stored.
    async fn append(&self, entry: AuditEntry) -> AuditLogResult<AppendOutcome>;

    /// Returns the snapshot carried by the most recent entry for a task.
    async fn latest_snapshot(&self, task_id: TaskId) -> AuditLogResult<Option<Value>>;

    /// Reads entries matching the query, recording-timestamp ascending,
    /// paginated, scoped to the query's owner.
    async fn query(&self, query: &AuditQuery) -> AuditLogResult<AuditPage>;
}

/// Errors returned by audit log implementations.
#[derive(Debug, Clone, Error)]
pub enum AuditLogError {
    /// Persistence-layer failure.
    #[error("audit persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AuditLogError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
