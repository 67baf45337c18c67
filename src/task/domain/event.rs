//! Immutable lifecycle events emitted for every successful task mutation.

use super::{OwnerId, Task, TaskId, TaskVersion};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a lifecycle or reminder event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of state transition a lifecycle event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A task was created.
    Created,
    /// A task's fields changed.
    Updated,
    /// A task transitioned from pending to completed.
    Completed,
    /// A task was deleted.
    Deleted,
}

impl EventKind {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of the mutation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// A direct API request.
    Api,
    /// A conversational command.
    Chat,
    /// The recurrence engine regenerating a completed task.
    Recurrence,
}

impl EventSource {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Chat => "chat",
            Self::Recurrence => "recurrence",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of a single task state transition.
///
/// Events for the same task id are delivered to every consumer group in
/// non-decreasing version order; ordering across different task ids is
/// not guaranteed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    event_id: EventId,
    task_id: TaskId,
    owner_id: OwnerId,
    kind: EventKind,
    task: Task,
    version: TaskVersion,
    produced_at: DateTime<Utc>,
    source: EventSource,
}

impl LifecycleEvent {
    /// Records a state transition from the committed task snapshot.
    ///
    /// The event's version is the task version the mutation committed;
    /// `Deleted` events reuse the final committed version.
    #[must_use]
    pub fn record(task: Task, kind: EventKind, source: EventSource, clock: &impl Clock) -> Self {
        Self {
            event_id: EventId::new(),
            task_id: task.id(),
            owner_id: task.owner_id().clone(),
            version: task.version(),
            kind,
            task,
            produced_at: clock.utc(),
            source,
        }
    }

    /// Returns the unique event identifier.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Returns the task id used as the partition/ordering key.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the owning user's identifier.
    #[must_use]
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Returns the kind of transition recorded.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// Returns the task snapshot taken at the time of the event.
    #[must_use]
    pub const fn task(&self) -> &Task {
        &self.task
    }

    /// Returns the task version this event corresponds to.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Returns the event production timestamp.
    #[must_use]
    pub const fn produced_at(&self) -> DateTime<Utc> {
        self.produced_at
    }

    /// Returns the provenance of the mutation.
    #[must_use]
    pub const fn source(&self) -> EventSource {
        self.source
    }

    /// Serializes the event into a transport payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying serialization error; lifecycle events are
    /// plain data and serialization only fails on resource exhaustion.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Reconstructs an event from a transport payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed
    /// payloads.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

/// Event emitted on the reminder topic when a scheduled reminder fires
/// and the task is still eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderDueEvent {
    /// Unique event identifier.
    pub event_id: EventId,
    /// Task the reminder belongs to.
    pub task_id: TaskId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Task title for notification display.
    pub title: String,
    /// Task due date, if any.
    pub due_at: Option<DateTime<Utc>>,
    /// The reminder time that produced the firing.
    pub remind_at: DateTime<Utc>,
    /// Event production timestamp.
    pub produced_at: DateTime<Utc>,
}

impl ReminderDueEvent {
    /// Serializes the event into a transport payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying serialization error.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Reconstructs an event from a transport payload.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed
    /// payloads.
    pub fn from_payload(payload: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}
