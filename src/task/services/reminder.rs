//! Reminder scheduling against the external timer service.
//!
//! The scheduler keeps one invariant: an active timer job exists for a
//! task exactly while the task is pending with a reminder in the future.
//! Scheduling happens synchronously inside the mutation path so no
//! reminder is silently dropped; cancellation is best-effort because a
//! job that fires late is neutralized by re-validating task state before
//! anything is emitted.

use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

use crate::task::domain::{EventId, ReminderDueEvent, Task, TaskId};
use crate::task::ports::{
    EventBus, ReminderJob, ReminderTimer, TOPIC_REMINDERS, TaskRepository, TaskRepositoryError,
    TimerError, TimerResult,
};
use crate::task::services::publisher::RetryPolicy;

/// Errors returned while handling a timer firing.
#[derive(Debug, Error)]
pub enum ReminderFireError {
    /// Task state could not be re-fetched; the firing should be
    /// redelivered by the timer service.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),

    /// The reminder-due event could not be handed to the bus within the
    /// retry bound; the firing should be redelivered.
    #[error("reminder event undeliverable: {0}")]
    Publish(String),
}

/// Result type for reminder firing.
pub type ReminderFireResult<T> = Result<T, ReminderFireError>;

/// Keeps the external timer service in step with task state.
#[derive(Clone)]
pub struct ReminderScheduler<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    bus: Arc<B>,
    timer: Arc<T>,
    clock: Arc<C>,
    retry: RetryPolicy,
}

impl<R, B, T, C> ReminderScheduler<R, B, T, C>
where
    R: TaskRepository,
    B: EventBus,
    T: ReminderTimer,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler over the given collaborators.
    #[must_use]
    pub const fn new(
        repository: Arc<R>,
        bus: Arc<B>,
        timer: Arc<T>,
        clock: Arc<C>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            bus,
            timer,
            clock,
            retry,
        }
    }

    /// Brings the timer job for a task in line with its current state:
    /// schedules (or replaces) a job while the task is pending with a
    /// future reminder, cancels any job otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Unavailable`] when a required scheduling
    /// call cannot reach the timer service; the caller surfaces this as
    /// a retryable failure. Cancellation failures are tolerated and only
    /// logged.
    pub async fn sync(&self, task: &Task) -> TimerResult<()> {
        let now = self.clock.utc();
        match ReminderJob::for_task(task) {
            Some(job) if task.is_pending() && job.remind_at > now => {
                let remind_at = job.remind_at;
                self.timer.schedule(job).await?;
                tracing::info!(task_id = %task.id(), %remind_at, "reminder_scheduled");
                Ok(())
            }
            _ => {
                self.cancel(task.id()).await;
                Ok(())
            }
        }
    }

    /// Issues a best-effort cancel for the task's timer job.
    ///
    /// Failures are logged, not surfaced: a job that survives fires into
    /// [`Self::on_fire`], which re-validates and drops it.
    pub async fn cancel(&self, task_id: TaskId) {
        match self.timer.cancel(task_id).await {
            Ok(()) => tracing::debug!(%task_id, "reminder_cancelled"),
            Err(err) => {
                tracing::warn!(%task_id, error = %err, "reminder_cancel_failed");
            }
        }
    }

    /// Handles a firing callback from the timer service.
    ///
    /// Current task state is re-fetched before anything is emitted: a
    /// task that was deleted or completed in the meantime, or whose
    /// reminder no longer matches the one that produced this job, turns
    /// the firing into a silent no-op. Only a still-eligible task
    /// produces a reminder-due event on the reminder topic.
    ///
    /// # Errors
    ///
    /// Returns [`ReminderFireError`] when state cannot be re-fetched or
    /// the event cannot be handed to the bus; the at-least-once timer
    /// contract redelivers the firing in both cases.
    pub async fn on_fire(&self, job: &ReminderJob) -> ReminderFireResult<()> {
        let fetched = self.repository.find(&job.owner_id, job.task_id).await?;
        let Some(task) = fetched else {
            tracing::debug!(task_id = %job.task_id, "stale_reminder_ignored");
            return Ok(());
        };
        if !task.is_pending() || task.remind_at() != Some(job.remind_at) {
            tracing::debug!(task_id = %job.task_id, "stale_reminder_ignored");
            return Ok(());
        }

        let event = ReminderDueEvent {
            event_id: EventId::new(),
            task_id: task.id(),
            owner_id: job.owner_id.clone(),
            title: task.title().as_str().to_owned(),
            due_at: task.due_at(),
            remind_at: job.remind_at,
            produced_at: self.clock.utc(),
        };
        self.emit(&event).await?;
        tracing::info!(
            task_id = %event.task_id,
            owner_id = %event.owner_id,
            "reminder_due_emitted"
        );
        Ok(())
    }

    /// Hands a reminder-due event to the bus with bounded retry.
    async fn emit(&self, event: &ReminderDueEvent) -> ReminderFireResult<()> {
        let payload = event
            .to_payload()
            .map_err(|err| ReminderFireError::Publish(err.to_string()))?;
        let mut last_error = String::new();
        for attempt in 0..self.retry.max_attempts() {
            match self
                .bus
                .publish(TOPIC_REMINDERS, event.task_id, payload.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        task_id = %event.task_id,
                        attempt,
                        error = %err,
                        "reminder_publish_retry"
                    );
                    last_error = err.to_string();
                    if attempt + 1 < self.retry.max_attempts() {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }
        Err(ReminderFireError::Publish(last_error))
    }
}
