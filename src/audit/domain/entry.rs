//! Audit entries, snapshot diffs, and query parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::task::domain::{EventId, EventKind, EventSource, LifecycleEvent, OwnerId, TaskId};

/// Unique identifier of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Creates a new random entry identifier.
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

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One changed field between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the change.
    pub before: Value,
    /// Value after the change.
    pub after: Value,
}

/// Top-level field differences between two task snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SnapshotDiff {
    /// Changed fields keyed by field name.
    pub changes: BTreeMap<String, FieldChange>,
}

impl SnapshotDiff {
    /// Computes the fields that differ between two snapshots.
    ///
    /// Snapshots are expected to be JSON objects; anything else is
    /// reported as a single whole-value change.
    #[must_use]
    pub fn between(previous: &Value, next: &Value) -> Self {
        let (Value::Object(prev_map), Value::Object(next_map)) = (previous, next) else {
            let mut changes = BTreeMap::new();
            if previous != next {
                changes.insert(
                    "snapshot".to_owned(),
                    FieldChange {
                        before: previous.clone(),
                        after: next.clone(),
                    },
                );
            }
            return Self { changes };
        };
        let mut changes = BTreeMap::new();
        let keys: std::collections::BTreeSet<&String> =
            prev_map.keys().chain(next_map.keys()).collect();
        for key in keys {
            let before = prev_map.get(key).cloned().unwrap_or(Value::Null);
            let after = next_map.get(key).cloned().unwrap_or(Value::Null);
            if before != after {
                changes.insert(key.clone(), FieldChange { before, after });
            }
        }
        Self { changes }
    }

    /// Returns `true` when the snapshots were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Immutable record of one processed lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry identifier.
    pub id: AuditEntryId,
    /// Task the entry refers to.
    pub task_id: TaskId,
    /// Owning user.
    pub owner_id: OwnerId,
    /// Kind of transition recorded.
    pub action: EventKind,
    /// Full task snapshot at the time of the event.
    pub snapshot: Value,
    /// Changed fields relative to the previous known snapshot; absent
    /// for the first entry of a task.
    pub diff: Option<SnapshotDiff>,
    /// Recording timestamp.
    pub recorded_at: DateTime<Utc>,
    /// Identifier of the lifecycle event this entry was derived from;
    /// the dedup key for redeliveries.
    pub source_event_id: EventId,
    /// Provenance of the mutation.
    pub source: EventSource,
}

impl AuditEntry {
    /// Derives an entry from a lifecycle event and the previous known
    /// snapshot of the same task.
    ///
    /// # Errors
    ///
    /// Returns the underlying serialization error when the snapshot
    /// cannot be represented as JSON.
    pub fn from_event(
        event: &LifecycleEvent,
        previous: Option<&Value>,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        let snapshot = serde_json::to_value(event.task())?;
        let diff = previous.map(|prev| SnapshotDiff::between(prev, &snapshot));
        Ok(Self {
            id: AuditEntryId::new(),
            task_id: event.task_id(),
            owner_id: event.owner_id().clone(),
            action: event.kind(),
            snapshot,
            diff,
            recorded_at,
            source_event_id: event.event_id(),
            source: event.source(),
        })
    }
}

/// Query parameters for reading the audit trail.
///
/// Results are scoped to one owner, ordered by recording timestamp
/// ascending, and paginated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Owner whose entries are visible.
    pub owner_id: OwnerId,
    /// Restrict to one task.
    pub task_id: Option<TaskId>,
    /// Keep entries recorded at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Keep entries recorded at or before this instant.
    pub to: Option<DateTime<Utc>>,
    /// 1-based page number.
    pub page: usize,
    /// Page size.
    pub page_size: usize,
}

impl AuditQuery {
    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Creates a query over every entry of the owner.
    #[must_use]
    pub const fn for_owner(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            task_id: None,
            from: None,
            to: None,
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Restricts the query to one task.
    #[must_use]
    pub const fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Keeps entries recorded at or after the given instant.
    #[must_use]
    pub const fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Keeps entries recorded at or before the given instant.
    #[must_use]
    pub const fn with_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the 1-based page number and page size.
    #[must_use]
    pub const fn paginated(mut self, page: usize, page_size: usize) -> Self {
        self.page = if page == 0 { 1 } else { page };
        self.page_size = if page_size == 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        self
    }

    /// Returns `true` when the entry passes every predicate (pagination
    /// aside).
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if entry.owner_id != self.owner_id {
            return false;
        }
        if self.task_id.is_some_and(|task_id| entry.task_id != task_id) {
            return false;
        }
        if self.from.is_some_and(|from| entry.recorded_at < from) {
            return false;
        }
        !self.to.is_some_and(|to| entry.recorded_at > to)
    }
}

/// One page of audit query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPage {
    /// Entries on this page, recording-timestamp ascending.
    pub entries: Vec<AuditEntry>,
    /// Total number of entries matching the query.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    /// Page size used.
    pub page_size: usize,
}
