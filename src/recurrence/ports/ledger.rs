//! Dedup ledger port for processed completion events.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::task::domain::{TaskId, TaskVersion};

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Persisted set of already-processed completions, keyed by the source
/// task id and the version its completion event carried.
///
/// Retention may be bounded: implementations only need to remember keys
/// long enough to cover the transport's redelivery window.
#[async_trait]
pub trait CompletionLedger: Send + Sync {
    /// Returns `true` when the completion was already processed.
    async fn contains(&self, task_id: TaskId, version: TaskVersion) -> LedgerResult<bool>;

    /// Marks the completion as processed.
    ///
    /// Returns `false` when the key was already present.
    async fn record(&self, task_id: TaskId, version: TaskVersion) -> LedgerResult<bool>;
}

/// Errors returned by ledger implementations.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Persistence-layer failure.
    #[error("ledger persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl LedgerError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
