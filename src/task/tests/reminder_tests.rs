//! Scheduling state-machine and fire-time re-validation tests.

use chrono::{Duration as ChronoDuration, Utc};
use mockable::DefaultClock;
use mockall::mock;
use mockall::predicate::eq;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::time::Duration;

use super::support::{owner, scheduled_task};
use crate::task::{
    adapters::memory::{InMemoryEventBus, InMemoryReminderTimer, InMemoryTaskRepository},
    domain::{ReminderDueEvent, TaskPatch},
    ports::{
        ReminderJob, ReminderTimer, TOPIC_REMINDERS, TaskRepository, TimerError, TimerResult,
    },
    services::{ReminderFireError, ReminderScheduler, RetryPolicy},
};

mock! {
    Timer {}

    #[async_trait::async_trait]
    impl ReminderTimer for Timer {
        async fn schedule(&self, job: ReminderJob) -> TimerResult<()>;
        async fn cancel(&self, task_id: crate::task::domain::TaskId) -> TimerResult<()>;
    }
}

type MemoryScheduler =
    ReminderScheduler<InMemoryTaskRepository, InMemoryEventBus, InMemoryReminderTimer, DefaultClock>;

struct Stack {
    repository: Arc<InMemoryTaskRepository>,
    bus: Arc<InMemoryEventBus>,
    timer: Arc<InMemoryReminderTimer>,
    scheduler: MemoryScheduler,
}

#[fixture]
fn stack() -> Stack {
    let repository = Arc::new(InMemoryTaskRepository::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let timer = Arc::new(InMemoryReminderTimer::new());
    let scheduler = ReminderScheduler::new(
        Arc::clone(&repository),
        Arc::clone(&bus),
        Arc::clone(&timer),
        Arc::new(DefaultClock),
        RetryPolicy::new(2, Duration::from_millis(1)),
    );
    Stack {
        repository,
        bus,
        timer,
        scheduler,
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_schedules_job_for_pending_task_with_future_reminder() {
    let due = Utc::now() + ChronoDuration::hours(2);
    let remind = Utc::now() + ChronoDuration::hours(1);
    let task = scheduled_task("Call dentist", due, Some(remind), None);

    let mut mock_timer = MockTimer::new();
    let expected = ReminderJob::for_task(&task).expect("task has reminder");
    mock_timer
        .expect_schedule()
        .with(eq(expected))
        .once()
        .returning(|_| Ok(()));

    let scheduler = ReminderScheduler::new(
        Arc::new(InMemoryTaskRepository::new()),
        Arc::new(InMemoryEventBus::new()),
        Arc::new(mock_timer),
        Arc::new(DefaultClock),
        RetryPolicy::default(),
    );
    scheduler.sync(&task).await.expect("sync succeeds");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_cancels_job_when_reminder_is_cleared(stack: Stack) {
    let due = Utc::now() + ChronoDuration::hours(2);
    let remind = Utc::now() + ChronoDuration::hours(1);
    let mut task = scheduled_task("Call dentist", due, Some(remind), None);
    stack.scheduler.sync(&task).await.expect("sync succeeds");
    assert_eq!(stack.timer.scheduled_count(), 1);

    task.apply_patch(TaskPatch::new().clear_remind_at(), &DefaultClock)
        .expect("patch applies");
    stack.scheduler.sync(&task).await.expect("sync succeeds");
    assert_eq!(stack.timer.scheduled_count(), 0);
    assert_eq!(stack.timer.cancelled(), vec![task.id()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_replaces_job_when_reminder_moves(stack: Stack) {
    let due = Utc::now() + ChronoDuration::hours(4);
    let remind = Utc::now() + ChronoDuration::hours(1);
    let mut task = scheduled_task("Call dentist", due, Some(remind), None);
    stack.scheduler.sync(&task).await.expect("sync succeeds");

    let moved = Utc::now() + ChronoDuration::hours(2);
    task.apply_patch(TaskPatch::new().with_remind_at(moved), &DefaultClock)
        .expect("patch applies");
    stack.scheduler.sync(&task).await.expect("sync succeeds");

    assert_eq!(stack.timer.scheduled_count(), 1);
    let job = stack.timer.job(task.id()).expect("job present");
    assert_eq!(job.remind_at, moved);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_treats_past_reminder_as_cancellation(stack: Stack) {
    let due = Utc::now() + ChronoDuration::hours(2);
    let remind = Utc::now() - ChronoDuration::minutes(5);
    let task = scheduled_task("Call dentist", due, Some(remind), None);
    stack.scheduler.sync(&task).await.expect("sync succeeds");
    assert_eq!(stack.timer.scheduled_count(), 0);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_surfaces_timer_unavailability_for_scheduling(stack: Stack) {
    let due = Utc::now() + ChronoDuration::hours(2);
    let remind = Utc::now() + ChronoDuration::hours(1);
    let task = scheduled_task("Call dentist", due, Some(remind), None);

    stack.timer.set_unavailable(true);
    let result = stack.scheduler.sync(&task).await;
    assert!(matches!(result, Err(TimerError::Unavailable(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn sync_tolerates_timer_unavailability_for_cancellation(stack: Stack) {
    let mut task = scheduled_task(
        "Call dentist",
        Utc::now() + ChronoDuration::hours(2),
        Some(Utc::now() + ChronoDuration::hours(1)),
        None,
    );
    task.complete(&DefaultClock).expect("completes");

    stack.timer.set_unavailable(true);
    stack
        .scheduler
        .sync(&task)
        .await
        .expect("cancellation failure is tolerated");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fire_emits_reminder_due_for_still_eligible_task(stack: Stack) {
    let due = Utc::now() + ChronoDuration::hours(2);
    let remind = Utc::now() + ChronoDuration::hours(1);
    let task = scheduled_task("Call dentist", due, Some(remind), None);
    stack.repository.insert(&task).await.expect("insert");
    let job = ReminderJob::for_task(&task).expect("task has reminder");

    stack.scheduler.on_fire(&job).await.expect("fire succeeds");

    let payloads = stack.bus.published(TOPIC_REMINDERS);
    assert_eq!(payloads.len(), 1);
    let event = ReminderDueEvent::from_payload(payloads.first().expect("one payload"))
        .expect("valid reminder event");
    assert_eq!(event.task_id, task.id());
    assert_eq!(event.owner_id, owner("owner-1"));
    assert_eq!(event.title, "Call dentist");
    assert_eq!(event.due_at, Some(due));
    assert_eq!(event.remind_at, remind);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fire_after_deletion_is_a_silent_no_op(stack: Stack) {
    let task = scheduled_task(
        "Call dentist",
        Utc::now() + ChronoDuration::hours(2),
        Some(Utc::now() + ChronoDuration::hours(1)),
        None,
    );
    let job = ReminderJob::for_task(&task).expect("task has reminder");
    // The task was never stored, matching a fire arriving after delete.
    stack.scheduler.on_fire(&job).await.expect("fire is no-op");
    assert!(stack.bus.published(TOPIC_REMINDERS).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fire_after_completion_is_a_silent_no_op(stack: Stack) {
    let mut task = scheduled_task(
        "Call dentist",
        Utc::now() + ChronoDuration::hours(2),
        Some(Utc::now() + ChronoDuration::hours(1)),
        None,
    );
    let job = ReminderJob::for_task(&task).expect("task has reminder");
    task.complete(&DefaultClock).expect("completes");
    stack.repository.insert(&task).await.expect("insert");

    stack.scheduler.on_fire(&job).await.expect("fire is no-op");
    assert!(stack.bus.published(TOPIC_REMINDERS).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fire_with_stale_reminder_time_is_a_silent_no_op(stack: Stack) {
    let mut task = scheduled_task(
        "Call dentist",
        Utc::now() + ChronoDuration::hours(4),
        Some(Utc::now() + ChronoDuration::hours(1)),
        None,
    );
    let stale_job = ReminderJob::for_task(&task).expect("task has reminder");
    task.apply_patch(
        TaskPatch::new().with_remind_at(Utc::now() + ChronoDuration::hours(2)),
        &DefaultClock,
    )
    .expect("patch applies");
    stack.repository.insert(&task).await.expect("insert");

    stack
        .scheduler
        .on_fire(&stale_job)
        .await
        .expect("fire is no-op");
    assert!(stack.bus.published(TOPIC_REMINDERS).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fire_surfaces_persistent_bus_failure_for_redelivery(stack: Stack) {
    let task = scheduled_task(
        "Call dentist",
        Utc::now() + ChronoDuration::hours(2),
        Some(Utc::now() + ChronoDuration::hours(1)),
        None,
    );
    stack.repository.insert(&task).await.expect("insert");
    let job = ReminderJob::for_task(&task).expect("task has reminder");

    stack.bus.set_unreachable(true);
    let result = stack.scheduler.on_fire(&job).await;
    assert!(matches!(result, Err(ReminderFireError::Publish(_))));
}
