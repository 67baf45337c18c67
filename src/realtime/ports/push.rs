//! Push channel port for one live client connection.

use async_trait::async_trait;
use thiserror::Error;

use crate::realtime::domain::ChangeNotification;

/// Result type for push operations.
pub type PushResult<T> = Result<T, PushError>;

/// One-way push transport to a single connected client.
///
/// There is no response contract; a failed push means the connection is
/// broken and the caller prunes it from its registry.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Pushes a change notification to the client.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Closed`] when the connection can no longer
    /// receive.
    async fn push(&self, notification: &ChangeNotification) -> PushResult<()>;
}

/// Errors returned by push channel implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PushError {
    /// The connection is closed or broken.
    #[error("connection closed: {0}")]
    Closed(String),
}
