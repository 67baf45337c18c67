//! Thread-safe in-memory audit log.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::audit::domain::{AuditEntry, AuditPage, AuditQuery};
use crate::audit::ports::{AppendOutcome, AuditLog, AuditLogError, AuditLogResult};
use crate::task::domain::{EventId, TaskId};

#[derive(Debug, Default)]
struct AuditLogState {
    entries: Vec<AuditEntry>,
    seen: HashSet<EventId>,
    latest: HashMap<TaskId, Value>,
}

/// Thread-safe in-memory audit log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditLog {
    state: Arc<RwLock<AuditLogState>>,
}

impl InMemoryAuditLog {
    /// Creates an empty in-memory audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored entry in append order, across all owners.
    ///
    /// # Errors
    ///
    /// Returns [`AuditLogError::Persistence`] when the backing lock is
    /// poisoned.
    pub fn entries(&self) -> AuditLogResult<Vec<AuditEntry>> {
        Ok(read_state(&self.state)?.entries.clone())
    }
}

fn read_state(
    state: &Arc<RwLock<AuditLogState>>,
) -> AuditLogResult<std::sync::RwLockReadGuard<'_, AuditLogState>> {
    state
        .read()
        .map_err(|err| AuditLogError::persistence(std::io::Error::other(err.to_string())))
}

fn write_state(
    state: &Arc<RwLock<AuditLogState>>,
) -> AuditLogResult<std::sync::RwLockWriteGuard<'_, AuditLogState>> {
    state
        .write()
        .map_err(|err| AuditLogError::persistence(std::io::Error::other(err.to_string())))
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> AuditLogResult<AppendOutcome> {
        let mut state = write_state(&self.state)?;
        if !state.seen.insert(entry.source_event_id) {
            return Ok(AppendOutcome::Duplicate);
        }
        state.latest.insert(entry.task_id, entry.snapshot.clone());
        state.entries.push(entry);
        Ok(AppendOutcome::Recorded)
    }

    async fn latest_snapshot(&self, task_id: TaskId) -> AuditLogResult<Option<Value>> {
        Ok(read_state(&self.state)?.latest.get(&task_id).cloned())
    }

    async fn query(&self, query: &AuditQuery) -> AuditLogResult<AuditPage> {
        let state = read_state(&self.state)?;
        let mut matches: Vec<AuditEntry> = state
            .entries
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        drop(state);
        matches.sort_by_key(|entry| entry.recorded_at);
        let total = matches.len();
        let start = query.page.saturating_sub(1).saturating_mul(query.page_size);
        let entries = matches
            .into_iter()
            .skip(start)
            .take(query.page_size)
            .collect();
        Ok(AuditPage {
            entries,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }
}
