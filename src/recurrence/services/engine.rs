//! Regenerates recurring tasks when their completion events arrive.

use std::sync::Arc;
use thiserror::Error;

use crate::recurrence::ports::{
    CompletionLedger, LedgerError, TaskCreator, TaskCreatorError,
};
use crate::task::domain::{EventKind, LifecycleEvent, Task, advance};
use crate::task::ports::{EventBus, Subscription, TOPIC_TASK_EVENTS};
use crate::task::services::CreateTaskRequest;

/// Consumer group name on the lifecycle topic.
pub const CONSUMER_GROUP: &str = "recurrence";

/// Errors returned while processing a completion event.
///
/// Every variant is retryable: the delivery stays unacknowledged and the
/// transport redelivers it.
#[derive(Debug, Error)]
pub enum RecurrenceError {
    /// The dedup ledger could not be read or written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The next occurrence could not be created.
    #[error(transparent)]
    Create(#[from] TaskCreatorError),
}

/// Result type for recurrence processing.
pub type RecurrenceResult<T> = Result<T, RecurrenceError>;

/// Consumes `completed` events and creates next occurrences.
#[derive(Clone)]
pub struct RecurrenceEngine<F, L>
where
    F: TaskCreator,
    L: CompletionLedger,
{
    creator: Arc<F>,
    ledger: Arc<L>,
}

impl<F, L> RecurrenceEngine<F, L>
where
    F: TaskCreator,
    L: CompletionLedger,
{
    /// Creates an engine over the given creator and ledger.
    #[must_use]
    pub const fn new(creator: Arc<F>, ledger: Arc<L>) -> Self {
        Self { creator, ledger }
    }

    /// Processes one lifecycle event idempotently.
    ///
    /// Non-completion events and tasks without a recurrence rule are
    /// skipped. A completion already present in the ledger is a no-op,
    /// so redelivering the same event any number of times creates at
    /// most one new task. The ledger is written only after a successful
    /// creation, leaving failed creations to be retried by redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`RecurrenceError`] on ledger or creation failure; the
    /// caller leaves the delivery unacknowledged.
    pub async fn handle_event(&self, event: &LifecycleEvent) -> RecurrenceResult<()> {
        if event.kind() != EventKind::Completed {
            return Ok(());
        }
        let task = event.task();
        let Some(rule) = task.recurrence() else {
            tracing::debug!(task_id = %event.task_id(), "task_not_recurring");
            return Ok(());
        };
        if self
            .ledger
            .contains(event.task_id(), event.version())
            .await?
        {
            tracing::debug!(
                task_id = %event.task_id(),
                version = %event.version(),
                "duplicate_completion_skipped"
            );
            return Ok(());
        }
        let Some(due_at) = task.due_at() else {
            // Creation-time validation makes this unrepresentable; an
            // event violating it is recorded and dropped, not retried.
            tracing::warn!(task_id = %event.task_id(), "recurring_task_without_due_date");
            self.ledger.record(event.task_id(), event.version()).await?;
            return Ok(());
        };
        let Some(next_due) = advance(due_at, rule.pattern()) else {
            tracing::warn!(task_id = %event.task_id(), "next_due_out_of_range");
            self.ledger.record(event.task_id(), event.version()).await?;
            return Ok(());
        };
        if rule.is_expired_at(next_due) {
            tracing::info!(
                task_id = %event.task_id(),
                %next_due,
                "recurrence_expired"
            );
            self.ledger.record(event.task_id(), event.version()).await?;
            return Ok(());
        }

        let request = next_occurrence_request(task, next_due);
        let created = self
            .creator
            .create(event.owner_id().clone(), request)
            .await?;
        self.ledger.record(event.task_id(), event.version()).await?;
        tracing::info!(
            source_task_id = %event.task_id(),
            new_task_id = %created.id(),
            due_at = %next_due,
            "next_occurrence_created"
        );
        Ok(())
    }

    /// Consumes the subscription until the transport closes it,
    /// acknowledging each delivery after successful processing.
    pub async fn run<B: EventBus>(&self, bus: &B, mut subscription: Subscription) {
        while let Some(delivery) = subscription.recv().await {
            let outcome = match LifecycleEvent::from_payload(&delivery.payload) {
                Ok(event) => self.handle_event(&event).await.map_err(|err| {
                    tracing::warn!(error = %err, "recurrence_processing_failed");
                }),
                Err(err) => {
                    // Poison message: acknowledging is the only way to
                    // keep it from being redelivered forever.
                    tracing::error!(error = %err, "malformed_event_dropped");
                    Ok(())
                }
            };
            if outcome.is_ok()
                && let Err(err) = bus
                    .ack(TOPIC_TASK_EVENTS, CONSUMER_GROUP, delivery.token)
                    .await
            {
                tracing::warn!(error = %err, "ack_failed");
            }
        }
    }
}

/// Builds the creation request for the next occurrence, carrying over
/// the source task's fields and shifting the reminder by its original
/// offset from the due date.
fn next_occurrence_request(task: &Task, next_due: chrono::DateTime<chrono::Utc>) -> CreateTaskRequest {
    let mut request = CreateTaskRequest::new(task.title().as_str())
        .with_priority(task.priority())
        .with_tags(task.tags().iter().cloned())
        .with_due_at(next_due);
    if let Some(description) = task.description() {
        request = request.with_description(description.as_str());
    }
    if let Some(rule) = task.recurrence() {
        request = request.with_recurrence(*rule);
    }
    if let (Some(due_at), Some(remind_at)) = (task.due_at(), task.remind_at()) {
        let offset = due_at - remind_at;
        request = request.with_remind_at(next_due - offset);
    }
    request
}
