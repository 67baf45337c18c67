//! Lifecycle event publisher with a per-task ordered outbox.
//!
//! Every committed mutation hands its event to the publisher, which
//! drains events strictly first-in-first-out per task id. A transport
//! failure therefore delays a task's later events instead of reordering
//! them; retries use bounded exponential backoff, and a task whose head
//! event exhausts its retries has its queued events parked for operator
//! visibility rather than silently dropped. The mutation path never
//! waits for delivery.

use mockable::Clock;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::task::domain::{EventId, EventKind, EventSource, LifecycleEvent, Task, TaskId};
use crate::task::ports::{EventBus, TOPIC_TASK_EVENTS};

/// Bounded exponential backoff policy for transport retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Largest exponent applied to the base delay.
    const MAX_SHIFT: u32 = 10;

    /// Creates a policy with the given attempt bound and base delay.
    ///
    /// At least one attempt is always made.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        let bounded = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts: bounded,
            base_delay,
        }
    }

    /// Returns the total number of attempts made before giving up.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay to wait after the given zero-based failed
    /// attempt: `base_delay * 2^attempt`, capped.
    #[must_use]
    pub const fn delay_after(&self, attempt: u32) -> Duration {
        let shift = if attempt > Self::MAX_SHIFT {
            Self::MAX_SHIFT
        } else {
            attempt
        };
        self.base_delay.saturating_mul(1_u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100))
    }
}

/// An event whose delivery was abandoned after exhausting retries.
///
/// Parked events are kept for operator visibility; the task mutation
/// they record is already durable and is never rolled back.
#[derive(Debug, Clone)]
pub struct ParkedEvent {
    /// The undelivered event.
    pub event: LifecycleEvent,
    /// Description of the final transport failure.
    pub error: String,
    /// Number of delivery attempts made.
    pub attempts: u32,
}

type Outbox = Arc<Mutex<HashMap<TaskId, VecDeque<LifecycleEvent>>>>;
type Parked = Arc<Mutex<Vec<ParkedEvent>>>;

/// Turns committed task mutations into lifecycle events on the bus.
#[derive(Debug)]
pub struct EventPublisher<B, C> {
    bus: Arc<B>,
    clock: Arc<C>,
    retry: RetryPolicy,
    outbox: Outbox,
    parked: Parked,
}

impl<B, C> EventPublisher<B, C>
where
    B: EventBus + 'static,
    C: Clock + Send + Sync,
{
    /// Creates a publisher over the given bus.
    #[must_use]
    pub fn new(bus: Arc<B>, clock: Arc<C>, retry: RetryPolicy) -> Self {
        Self {
            bus,
            clock,
            retry,
            outbox: Arc::new(Mutex::new(HashMap::new())),
            parked: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Records a lifecycle event for the committed task snapshot and
    /// queues it for ordered delivery.
    ///
    /// Returns the event id immediately; delivery proceeds in the
    /// background and per-task order is preserved across retries.
    pub fn publish(&self, task: &Task, kind: EventKind, source: EventSource) -> EventId {
        let event = LifecycleEvent::record(task.clone(), kind, source, &*self.clock);
        let event_id = event.event_id();
        let task_id = event.task_id();
        tracing::debug!(%event_id, %task_id, kind = %kind, "event_queued");
        let spawn_drainer = {
            let mut outbox = lock(&self.outbox);
            // A queue entry exists exactly while a drainer is active for
            // the task; only the drainer removes it.
            let vacant = !outbox.contains_key(&task_id);
            outbox.entry(task_id).or_default().push_back(event);
            vacant
        };
        if spawn_drainer {
            let bus = Arc::clone(&self.bus);
            let outbox = Arc::clone(&self.outbox);
            let parked = Arc::clone(&self.parked);
            let retry = self.retry;
            tokio::spawn(async move {
                drain_task_queue(bus, outbox, parked, retry, task_id).await;
            });
        }
        event_id
    }

    /// Waits until every queued event has been delivered or parked.
    ///
    /// Intended for graceful shutdown and deterministic tests.
    pub async fn flush(&self) {
        loop {
            if lock(&self.outbox).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Returns the events abandoned after exhausting retries.
    #[must_use]
    pub fn parked(&self) -> Vec<ParkedEvent> {
        lock(&self.parked).clone()
    }
}

fn lock<T>(mutex: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pops the head event of a task's queue, or tears the queue down when
/// it is empty.
fn next_head(outbox: &Outbox, task_id: TaskId) -> Option<LifecycleEvent> {
    let mut guard = lock(outbox);
    let queue = guard.get_mut(&task_id)?;
    let head = queue.front().cloned();
    if head.is_none() {
        guard.remove(&task_id);
    }
    head
}

/// Moves everything still queued for a task into the parked list.
fn park_queue(outbox: &Outbox, parked: &Parked, task_id: TaskId, error: &str, attempts: u32) {
    let drained = lock(outbox).remove(&task_id).unwrap_or_default();
    let mut parked_guard = lock(parked);
    for event in drained {
        tracing::error!(
            event_id = %event.event_id(),
            %task_id,
            error,
            "event_parked"
        );
        parked_guard.push(ParkedEvent {
            event,
            error: error.to_owned(),
            attempts,
        });
    }
}

/// Delivers a task's queued events in order until the queue is empty or
/// the head exhausts its retries.
async fn drain_task_queue<B: EventBus>(
    bus: Arc<B>,
    outbox: Outbox,
    parked: Parked,
    retry: RetryPolicy,
    task_id: TaskId,
) {
    while let Some(event) = next_head(&outbox, task_id) {
        match deliver_with_retry(bus.as_ref(), retry, &event).await {
            Ok(()) => {
                let mut guard = lock(&outbox);
                if let Some(queue) = guard.get_mut(&task_id) {
                    drop(queue.pop_front());
                }
            }
            Err(error) => {
                park_queue(&outbox, &parked, task_id, &error, retry.max_attempts());
                return;
            }
        }
    }
}

/// Attempts delivery with bounded exponential backoff.
async fn deliver_with_retry<B: EventBus>(
    bus: &B,
    retry: RetryPolicy,
    event: &LifecycleEvent,
) -> Result<(), String> {
    let payload = match event.to_payload() {
        Ok(payload) => payload,
        // An unserializable event cannot succeed on retry.
        Err(err) => return Err(err.to_string()),
    };
    let mut last_error = String::new();
    for attempt in 0..retry.max_attempts() {
        match bus
            .publish(TOPIC_TASK_EVENTS, event.task_id(), payload.clone())
            .await
        {
            Ok(()) => {
                tracing::debug!(
                    event_id = %event.event_id(),
                    task_id = %event.task_id(),
                    "event_delivered"
                );
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(
                    event_id = %event.event_id(),
                    task_id = %event.task_id(),
                    attempt,
                    error = %err,
                    "event_publish_retry"
                );
                last_error = err.to_string();
                if attempt + 1 < retry.max_attempts() {
                    tokio::time::sleep(retry.delay_after(attempt)).await;
                }
            }
        }
    }
    Err(last_error)
}
