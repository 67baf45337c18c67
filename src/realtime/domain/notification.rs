//! Change notifications pushed to live client connections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::task::domain::{EventKind, LifecycleEvent, Task, TaskId};

/// Unique identifier of one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compact change payload pushed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    /// Kind of change.
    pub action: EventKind,
    /// Task the change refers to.
    pub task_id: TaskId,
    /// The new task snapshot, or `None` for deletions.
    pub task: Option<Task>,
    /// When the underlying event was produced.
    pub produced_at: DateTime<Utc>,
}

impl ChangeNotification {
    /// Builds the notification for a lifecycle event; deletions carry no
    /// snapshot.
    #[must_use]
    pub fn from_event(event: &LifecycleEvent) -> Self {
        let task = if event.kind() == EventKind::Deleted {
            None
        } else {
            Some(event.task().clone())
        };
        Self {
            action: event.kind(),
            task_id: event.task_id(),
            task,
            produced_at: event.produced_at(),
        }
    }
}
