//! In-memory reminder timer for tests.
//!
//! Records scheduled jobs keyed by task id (upsert semantics) and lets
//! tests fire a job manually by taking it out of the store, mirroring a
//! one-shot external timer service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::task::domain::TaskId;
use crate::task::ports::{ReminderJob, ReminderTimer, TimerError, TimerResult};

#[derive(Debug, Default)]
struct TimerState {
    jobs: HashMap<TaskId, ReminderJob>,
    cancelled: Vec<TaskId>,
    unavailable: bool,
}

/// Thread-safe in-memory reminder timer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReminderTimer {
    state: Arc<Mutex<TimerState>>,
}

impl InMemoryReminderTimer {
    /// Creates an empty in-memory timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the timer into (or out of) unavailable mode; while set,
    /// every call fails with [`TimerError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock_state().unavailable = unavailable;
    }

    /// Returns the active job for a task, if one is scheduled.
    #[must_use]
    pub fn job(&self, task_id: TaskId) -> Option<ReminderJob> {
        self.lock_state().jobs.get(&task_id).cloned()
    }

    /// Returns the number of active jobs.
    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.lock_state().jobs.len()
    }

    /// Removes and returns the active job for a task, simulating the
    /// one-shot firing of the external timer.
    #[must_use]
    pub fn take_job(&self, task_id: TaskId) -> Option<ReminderJob> {
        self.lock_state().jobs.remove(&task_id)
    }

    /// Returns every task id a cancel was issued for, in call order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<TaskId> {
        self.lock_state().cancelled.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ReminderTimer for InMemoryReminderTimer {
    async fn schedule(&self, job: ReminderJob) -> TimerResult<()> {
        let mut state = self.lock_state();
        if state.unavailable {
            return Err(TimerError::Unavailable(
                "forced unavailable for test".to_owned(),
            ));
        }
        state.jobs.insert(job.task_id, job);
        Ok(())
    }

    async fn cancel(&self, task_id: TaskId) -> TimerResult<()> {
        let mut state = self.lock_state();
        if state.unavailable {
            return Err(TimerError::Unavailable(
                "forced unavailable for test".to_owned(),
            ));
        }
        state.jobs.remove(&task_id);
        state.cancelled.push(task_id);
        Ok(())
    }
}
