//! Bounded in-memory completion ledger.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::recurrence::ports::{CompletionLedger, LedgerResult};
use crate::task::domain::{TaskId, TaskVersion};

type LedgerKey = (TaskId, TaskVersion);

#[derive(Debug, Default)]
struct LedgerState {
    seen: HashSet<LedgerKey>,
    order: VecDeque<LedgerKey>,
}

/// Thread-safe in-memory completion ledger with bounded retention.
///
/// Once the capacity is reached, the oldest keys are evicted first; the
/// capacity only needs to exceed the transport's redelivery window.
#[derive(Debug, Clone)]
pub struct InMemoryCompletionLedger {
    state: Arc<Mutex<LedgerState>>,
    capacity: usize,
}

impl InMemoryCompletionLedger {
    /// Default retention capacity.
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Creates a ledger with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a ledger retaining at most `capacity` keys.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the number of retained keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_state().order.len()
    }

    /// Returns `true` when no key is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_state().order.is_empty()
    }

    fn lock_state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryCompletionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionLedger for InMemoryCompletionLedger {
    async fn contains(&self, task_id: TaskId, version: TaskVersion) -> LedgerResult<bool> {
        Ok(self.lock_state().seen.contains(&(task_id, version)))
    }

    async fn record(&self, task_id: TaskId, version: TaskVersion) -> LedgerResult<bool> {
        let mut state = self.lock_state();
        let key = (task_id, version);
        if !state.seen.insert(key) {
            return Ok(false);
        }
        state.order.push_back(key);
        while state.order.len() > self.capacity {
            if let Some(evicted) = state.order.pop_front() {
                state.seen.remove(&evicted);
            }
        }
        Ok(true)
    }
}
