//! Broadcast, pruning, and dedup tests for the change fanout.

use mockable::DefaultClock;
use rstest::{fixture, rstest};
use std::sync::Arc;

use crate::realtime::{
    adapters::memory::InMemoryPushChannel, ports::PushChannel, services::ChangeFanout,
};
use crate::task::domain::{
    EventKind, EventSource, LifecycleEvent, NewTaskData, OwnerId, Task, TaskTitle,
};

#[fixture]
fn fanout() -> ChangeFanout {
    ChangeFanout::new()
}

fn owner(value: &str) -> OwnerId {
    OwnerId::new(value).expect("valid owner id")
}

fn new_task(owner_value: &str, title: &str) -> Task {
    let data = NewTaskData::new(TaskTitle::new(title).expect("valid title"));
    Task::create(owner(owner_value), data, &DefaultClock).expect("valid task")
}

fn event_for(task: &Task, kind: EventKind) -> LifecycleEvent {
    LifecycleEvent::record(task.clone(), kind, EventSource::Api, &DefaultClock)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn broadcast_reaches_every_connection_of_the_owner(fanout: ChangeFanout) {
    let first = Arc::new(InMemoryPushChannel::new());
    let second = Arc::new(InMemoryPushChannel::new());
    fanout.register(owner("owner-1"), Arc::clone(&first) as Arc<dyn PushChannel>);
    fanout.register(owner("owner-1"), Arc::clone(&second) as Arc<dyn PushChannel>);

    let task = new_task("owner-1", "Buy groceries");
    fanout.handle_event(&event_for(&task, EventKind::Created)).await;

    for channel in [&first, &second] {
        let pushed = channel.pushed();
        assert_eq!(pushed.len(), 1);
        let notification = pushed.first().expect("one notification");
        assert_eq!(notification.action, EventKind::Created);
        assert_eq!(notification.task_id, task.id());
        assert_eq!(notification.task.as_ref(), Some(&task));
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn other_owners_connections_receive_nothing(fanout: ChangeFanout) {
    let mine = Arc::new(InMemoryPushChannel::new());
    let theirs = Arc::new(InMemoryPushChannel::new());
    fanout.register(owner("owner-1"), Arc::clone(&mine) as Arc<dyn PushChannel>);
    fanout.register(owner("owner-2"), Arc::clone(&theirs) as Arc<dyn PushChannel>);

    let task = new_task("owner-1", "Buy groceries");
    fanout.handle_event(&event_for(&task, EventKind::Created)).await;

    assert_eq!(mine.pushed().len(), 1);
    assert!(theirs.pushed().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deletion_notifications_carry_no_snapshot(fanout: ChangeFanout) {
    let channel = Arc::new(InMemoryPushChannel::new());
    fanout.register(owner("owner-1"), Arc::clone(&channel) as Arc<dyn PushChannel>);

    let task = new_task("owner-1", "Buy groceries");
    fanout.handle_event(&event_for(&task, EventKind::Deleted)).await;

    let pushed = channel.pushed();
    let notification = pushed.first().expect("one notification");
    assert_eq!(notification.action, EventKind::Deleted);
    assert!(notification.task.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn broken_connections_are_pruned_on_push_failure(fanout: ChangeFanout) {
    let healthy = Arc::new(InMemoryPushChannel::new());
    let broken = Arc::new(InMemoryPushChannel::new());
    fanout.register(owner("owner-1"), Arc::clone(&healthy) as Arc<dyn PushChannel>);
    fanout.register(owner("owner-1"), Arc::clone(&broken) as Arc<dyn PushChannel>);
    broken.close();

    let task = new_task("owner-1", "Buy groceries");
    fanout.handle_event(&event_for(&task, EventKind::Created)).await;
    assert_eq!(fanout.connection_count(), 1);

    fanout.handle_event(&event_for(&task, EventKind::Updated)).await;
    assert_eq!(healthy.pushed().len(), 2);
    assert!(broken.pushed().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_events_are_pushed_once(fanout: ChangeFanout) {
    let channel = Arc::new(InMemoryPushChannel::new());
    fanout.register(owner("owner-1"), Arc::clone(&channel) as Arc<dyn PushChannel>);

    let task = new_task("owner-1", "Buy groceries");
    let event = event_for(&task, EventKind::Created);
    fanout.handle_event(&event).await;
    fanout.handle_event(&event).await;

    assert_eq!(channel.pushed().len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_connections_stop_receiving(fanout: ChangeFanout) {
    let channel = Arc::new(InMemoryPushChannel::new());
    let connection_id = fanout.register(owner("owner-1"), Arc::clone(&channel) as Arc<dyn PushChannel>);

    let task = new_task("owner-1", "Buy groceries");
    fanout.handle_event(&event_for(&task, EventKind::Created)).await;
    fanout.unregister(&owner("owner-1"), connection_id);
    assert_eq!(fanout.connection_count(), 0);

    fanout.handle_event(&event_for(&task, EventKind::Updated)).await;
    assert_eq!(channel.pushed().len(), 1);
}
