//! Records one audit entry per processed lifecycle event.

use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

use crate::audit::domain::{AuditEntry, AuditPage, AuditQuery};
use crate::audit::ports::{AppendOutcome, AuditLog, AuditLogError};
use crate::task::domain::{EventKind, LifecycleEvent};
use crate::task::ports::{EventBus, Subscription, TOPIC_TASK_EVENTS};

/// Consumer group name on the lifecycle topic.
pub const CONSUMER_GROUP: &str = "audit";

/// Errors returned while recording an event.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit log could not be read or written; retryable via
    /// redelivery.
    #[error(transparent)]
    Log(#[from] AuditLogError),
}

/// Result type for audit recording.
pub type AuditResult<T> = Result<T, AuditError>;

/// Consumes every lifecycle event into the append-only audit log.
#[derive(Clone)]
pub struct AuditRecorder<L, C>
where
    L: AuditLog,
    C: Clock + Send + Sync,
{
    log: Arc<L>,
    clock: Arc<C>,
}

impl<L, C> AuditRecorder<L, C>
where
    L: AuditLog,
    C: Clock + Send + Sync,
{
    /// Creates a recorder over the given log.
    #[must_use]
    pub const fn new(log: Arc<L>, clock: Arc<C>) -> Self {
        Self { log, clock }
    }

    /// Processes one lifecycle event idempotently.
    ///
    /// The entry's diff is computed against the previous known snapshot
    /// for the task; `created` events (and the first entry seen for a
    /// task) carry the full snapshot only. Redelivered events collapse
    /// to a no-op inside the log's append contract.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Log`] when the log cannot be read or
    /// written; the caller leaves the delivery unacknowledged.
    pub async fn handle_event(&self, event: &LifecycleEvent) -> AuditResult<()> {
        let previous = if event.kind() == EventKind::Created {
            None
        } else {
            self.log.latest_snapshot(event.task_id()).await?
        };
        let entry = match AuditEntry::from_event(event, previous.as_ref(), self.clock.utc()) {
            Ok(entry) => entry,
            Err(err) => {
                // An unserializable snapshot cannot succeed on retry.
                tracing::error!(
                    event_id = %event.event_id(),
                    error = %err,
                    "audit_snapshot_unserializable"
                );
                return Ok(());
            }
        };
        let entry_id = entry.id;
        match self.log.append(entry).await? {
            AppendOutcome::Recorded => {
                tracing::info!(
                    audit_id = %entry_id,
                    task_id = %event.task_id(),
                    action = %event.kind(),
                    "audit_entry_recorded"
                );
            }
            AppendOutcome::Duplicate => {
                tracing::debug!(
                    event_id = %event.event_id(),
                    "duplicate_event_dropped"
                );
            }
        }
        Ok(())
    }

    /// Reads the owner-scoped audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Log`] when the query fails.
    pub async fn query(&self, query: &AuditQuery) -> AuditResult<AuditPage> {
        Ok(self.log.query(query).await?)
    }

    /// Consumes the subscription until the transport closes it,
    /// acknowledging each delivery after successful processing.
    pub async fn run<B: EventBus>(&self, bus: &B, mut subscription: Subscription) {
        while let Some(delivery) = subscription.recv().await {
            let outcome = match LifecycleEvent::from_payload(&delivery.payload) {
                Ok(event) => self.handle_event(&event).await.map_err(|err| {
                    tracing::warn!(error = %err, "audit_processing_failed");
                }),
                Err(err) => {
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
