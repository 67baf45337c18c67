//! Regeneration and idempotence tests for the recurrence engine.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::recurrence::{
    adapters::memory::InMemoryCompletionLedger,
    ports::{CompletionLedger, TaskCreator, TaskCreatorError, TaskCreatorResult},
    services::RecurrenceEngine,
};
use crate::task::{
    adapters::memory::{InMemoryEventBus, InMemoryReminderTimer, InMemoryTaskRepository},
    domain::{
        EventKind, EventSource, LifecycleEvent, OwnerId, Priority, RecurrencePattern,
        RecurrenceRule, Task, TaskFilter, TaskStatus, TaskVersion,
    },
    services::{
        CreateTaskRequest, EventPublisher, ReminderScheduler, RetryPolicy, TaskStoreService,
    },
};

type TestStore =
    TaskStoreService<InMemoryTaskRepository, InMemoryEventBus, InMemoryReminderTimer, DefaultClock>;

struct Stack {
    store: Arc<TestStore>,
    ledger: Arc<InMemoryCompletionLedger>,
    engine: RecurrenceEngine<TestStore, InMemoryCompletionLedger>,
}

fn owner(value: &str) -> OwnerId {
    OwnerId::new(value).expect("valid owner id")
}

fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

fn build_store() -> Arc<TestStore> {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let timer = Arc::new(InMemoryReminderTimer::new());
    let clock = Arc::new(DefaultClock);
    let retry = RetryPolicy::new(3, Duration::from_millis(2));
    let publisher = Arc::new(EventPublisher::new(
        Arc::clone(&bus),
        Arc::clone(&clock),
        retry,
    ));
    let reminders = Arc::new(ReminderScheduler::new(
        Arc::clone(&repository),
        bus,
        timer,
        Arc::clone(&clock),
        retry,
    ));
    Arc::new(TaskStoreService::new(repository, publisher, reminders, clock))
}

#[fixture]
fn stack() -> Stack {
    let store = build_store();
    let ledger = Arc::new(InMemoryCompletionLedger::new());
    let engine = RecurrenceEngine::new(Arc::clone(&store), Arc::clone(&ledger));
    Stack {
        store,
        ledger,
        engine,
    }
}

/// Creates and completes a recurring task, returning the completion
/// event as the bus would deliver it.
async fn completed_event(stack: &Stack, rule: RecurrenceRule) -> (Task, LifecycleEvent) {
    let owner_id = owner("owner-1");
    let request = CreateTaskRequest::new("Weekly review")
        .with_description("Go through the planning board")
        .with_priority(Priority::High)
        .with_tags(vec!["planning".to_owned()])
        .with_due_at(utc(2025, 3, 1, 17, 0))
        .with_remind_at(utc(2025, 3, 1, 16, 0))
        .with_recurrence(rule);
    let task = stack
        .store
        .create(owner_id.clone(), request, EventSource::Api)
        .await
        .expect("create succeeds");
    let completed = stack
        .store
        .complete(&owner_id, task.id(), task.version(), EventSource::Api)
        .await
        .expect("complete succeeds");
    let event = LifecycleEvent::record(
        completed.clone(),
        EventKind::Completed,
        EventSource::Api,
        &DefaultClock,
    );
    (completed, event)
}

async fn pending_tasks(stack: &Stack) -> Vec<Task> {
    stack
        .store
        .list(
            &owner("owner-1"),
            &TaskFilter::new().with_status(TaskStatus::Pending),
        )
        .await
        .expect("list succeeds")
        .tasks
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn completion_of_weekly_task_creates_shifted_next_occurrence(stack: Stack) {
    let rule = RecurrenceRule::new(RecurrencePattern::Weekly);
    let (completed, event) = completed_event(&stack, rule).await;

    stack
        .engine
        .handle_event(&event)
        .await
        .expect("handling succeeds");

    let pending = pending_tasks(&stack).await;
    assert_eq!(pending.len(), 1);
    let next = pending.first().expect("one pending task");
    assert_ne!(next.id(), completed.id());
    assert_eq!(next.title().as_str(), "Weekly review");
    assert_eq!(next.priority(), Priority::High);
    assert_eq!(next.due_at(), Some(utc(2025, 3, 8, 17, 0)));
    assert_eq!(next.remind_at(), Some(utc(2025, 3, 8, 16, 0)));
    assert_eq!(next.recurrence(), Some(&rule));
    assert_eq!(next.version(), TaskVersion::initial());
    assert!(next.tags().contains("planning"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_completion_creates_at_most_one_task(stack: Stack) {
    let (_, event) = completed_event(&stack, RecurrenceRule::new(RecurrencePattern::Weekly)).await;

    for _ in 0..3 {
        stack
            .engine
            .handle_event(&event)
            .await
            .expect("handling succeeds");
    }

    assert_eq!(pending_tasks(&stack).await.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_rule_creates_nothing_but_is_recorded(stack: Stack) {
    let rule =
        RecurrenceRule::new(RecurrencePattern::Weekly).with_until(utc(2025, 3, 5, 0, 0));
    let (completed, event) = completed_event(&stack, rule).await;

    stack
        .engine
        .handle_event(&event)
        .await
        .expect("handling succeeds");

    assert!(pending_tasks(&stack).await.is_empty());
    assert!(
        stack
            .ledger
            .contains(completed.id(), event.version())
            .await
            .expect("contains")
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_recurring_completion_is_skipped(stack: Stack) {
    let owner_id = owner("owner-1");
    let task = stack
        .store
        .create(
            owner_id.clone(),
            CreateTaskRequest::new("One-off errand"),
            EventSource::Api,
        )
        .await
        .expect("create succeeds");
    let completed = stack
        .store
        .complete(&owner_id, task.id(), task.version(), EventSource::Api)
        .await
        .expect("complete succeeds");
    let event = LifecycleEvent::record(
        completed,
        EventKind::Completed,
        EventSource::Api,
        &DefaultClock,
    );

    stack
        .engine
        .handle_event(&event)
        .await
        .expect("handling succeeds");
    assert!(pending_tasks(&stack).await.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_completion_events_are_ignored(stack: Stack) {
    let owner_id = owner("owner-1");
    let task = stack
        .store
        .create(
            owner_id,
            CreateTaskRequest::new("Weekly review")
                .with_due_at(utc(2025, 3, 1, 17, 0))
                .with_recurrence(RecurrenceRule::new(RecurrencePattern::Weekly)),
            EventSource::Api,
        )
        .await
        .expect("create succeeds");
    let event =
        LifecycleEvent::record(task, EventKind::Updated, EventSource::Api, &DefaultClock);

    stack
        .engine
        .handle_event(&event)
        .await
        .expect("handling succeeds");
    // Only the original task exists; no occurrence was spawned.
    assert_eq!(pending_tasks(&stack).await.len(), 1);
}

/// Creator that fails a fixed number of times before delegating.
struct FlakyCreator {
    inner: Arc<TestStore>,
    remaining_failures: AtomicUsize,
}

#[async_trait]
impl TaskCreator for FlakyCreator {
    async fn create(
        &self,
        owner_id: OwnerId,
        request: CreateTaskRequest,
    ) -> TaskCreatorResult<Task> {
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok()
        {
            return Err(TaskCreatorError::new(std::io::Error::other(
                "injected create failure",
            )));
        }
        TaskCreator::create(self.inner.as_ref(), owner_id, request).await
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_creation_is_retried_by_redelivery_without_double_creation(stack: Stack) {
    let (completed, event) =
        completed_event(&stack, RecurrenceRule::new(RecurrencePattern::Weekly)).await;
    let flaky = Arc::new(FlakyCreator {
        inner: Arc::clone(&stack.store),
        remaining_failures: AtomicUsize::new(1),
    });
    let engine = RecurrenceEngine::new(flaky, Arc::clone(&stack.ledger));

    let first = engine.handle_event(&event).await;
    assert!(first.is_err());
    assert!(
        !stack
            .ledger
            .contains(completed.id(), event.version())
            .await
            .expect("contains")
    );
    assert!(pending_tasks(&stack).await.is_empty());

    engine
        .handle_event(&event)
        .await
        .expect("redelivery succeeds");
    assert_eq!(pending_tasks(&stack).await.len(), 1);

    engine
        .handle_event(&event)
        .await
        .expect("further redelivery is a no-op");
    assert_eq!(pending_tasks(&stack).await.len(), 1);
}
