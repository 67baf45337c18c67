//! Contract tests for the in-memory task repository.

use mockable::DefaultClock;
use rstest::{fixture, rstest};

use super::support::{owner, sample_task, scheduled_task, task_data, utc};
use crate::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::{Priority, SortField, SortOrder, Task, TaskFilter, TaskPatch, TaskStatus, TaskTitle},
    ports::{TaskRepository, TaskRepositoryError},
};

#[fixture]
fn repository() -> InMemoryTaskRepository {
    InMemoryTaskRepository::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn insert_then_find_round_trips(repository: InMemoryTaskRepository) {
    let task = sample_task("Buy groceries");
    repository.insert(&task).await.expect("insert succeeds");

    let fetched = repository
        .find(task.owner_id(), task.id())
        .await
        .expect("find succeeds");
    assert_eq!(fetched, Some(task));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn insert_rejects_duplicate_identifier(repository: InMemoryTaskRepository) {
    let task = sample_task("Buy groceries");
    repository.insert(&task).await.expect("insert succeeds");

    let result = repository.insert(&task).await;
    assert!(matches!(
        result,
        Err(TaskRepositoryError::DuplicateTask(id)) if id == task.id()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_hides_other_owners_tasks(repository: InMemoryTaskRepository) {
    let task = sample_task("Buy groceries");
    repository.insert(&task).await.expect("insert succeeds");

    let fetched = repository
        .find(&owner("owner-2"), task.id())
        .await
        .expect("find succeeds");
    assert!(fetched.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_with_stale_version_is_rejected(repository: InMemoryTaskRepository) {
    let mut task = sample_task("Buy groceries");
    repository.insert(&task).await.expect("insert succeeds");

    let stale_version = task.version();
    task.apply_patch(
        TaskPatch::new().with_priority(Priority::High),
        &DefaultClock,
    )
    .expect("patch applies");
    repository
        .update(&task, stale_version)
        .await
        .expect("first update succeeds");

    // A second writer still holding the original version must conflict.
    let mut stale_copy = task.clone();
    stale_copy
        .apply_patch(TaskPatch::new().with_priority(Priority::Low), &DefaultClock)
        .expect("patch applies");
    let result = repository.update(&stale_copy, stale_version).await;
    assert!(matches!(
        result,
        Err(TaskRepositoryError::VersionConflict { expected, actual, .. })
            if expected == stale_version && actual == task.version()
    ));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_enforces_version_check(repository: InMemoryTaskRepository) {
    let mut task = sample_task("Buy groceries");
    repository.insert(&task).await.expect("insert succeeds");
    let stale_version = task.version();
    task.apply_patch(
        TaskPatch::new().with_priority(Priority::High),
        &DefaultClock,
    )
    .expect("patch applies");
    repository
        .update(&task, stale_version)
        .await
        .expect("update succeeds");

    let stale_delete = repository
        .delete(task.owner_id(), task.id(), stale_version)
        .await;
    assert!(matches!(
        stale_delete,
        Err(TaskRepositoryError::VersionConflict { .. })
    ));

    repository
        .delete(task.owner_id(), task.id(), task.version())
        .await
        .expect("fresh delete succeeds");
    let fetched = repository
        .find(task.owner_id(), task.id())
        .await
        .expect("find succeeds");
    assert!(fetched.is_none());
}

async fn seed_varied_tasks(repository: &InMemoryTaskRepository) -> Vec<Task> {
    let mut urgent = task_data("Pay rent");
    urgent.priority = Priority::High;
    urgent.tags = ["finance".to_owned()].into_iter().collect();
    urgent.due_at = Some(utc(2026, 2, 10, 9, 0));
    let urgent_task = Task::create(owner("owner-1"), urgent, &DefaultClock).expect("valid task");

    let mut chore = task_data("Clean kitchen");
    chore.priority = Priority::Low;
    chore.tags = ["home".to_owned()].into_iter().collect();
    chore.due_at = Some(utc(2026, 2, 20, 9, 0));
    let chore_task = Task::create(owner("owner-1"), chore, &DefaultClock).expect("valid task");

    let mut done = task_data("File taxes");
    done.tags = ["finance".to_owned(), "paperwork".to_owned()]
        .into_iter()
        .collect();
    let mut done_task = Task::create(owner("owner-1"), done, &DefaultClock).expect("valid task");
    done_task.complete(&DefaultClock).expect("completes");

    repository.insert(&urgent_task).await.expect("insert");
    repository.insert(&chore_task).await.expect("insert");
    repository.insert(&done_task).await.expect("insert");

    vec![urgent_task, chore_task, done_task]
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_filters_by_status_priority_and_tags(repository: InMemoryTaskRepository) {
    let seeded = seed_varied_tasks(&repository).await;
    let owner_id = owner("owner-1");

    let pending = repository
        .query(&owner_id, &TaskFilter::new().with_status(TaskStatus::Pending))
        .await
        .expect("query succeeds");
    assert_eq!(pending.len(), 2);

    let high = repository
        .query(&owner_id, &TaskFilter::new().with_priority(Priority::High))
        .await
        .expect("query succeeds");
    assert_eq!(high.len(), 1);
    assert_eq!(high.first().map(Task::id), seeded.first().map(Task::id));

    let finance = repository
        .query(
            &owner_id,
            &TaskFilter::new().with_tags(vec!["finance".to_owned()]),
        )
        .await
        .expect("query succeeds");
    assert_eq!(finance.len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_filters_by_due_range_and_text(repository: InMemoryTaskRepository) {
    seed_varied_tasks(&repository).await;
    let owner_id = owner("owner-1");

    let due_soon = repository
        .query(
            &owner_id,
            &TaskFilter::new().with_due_before(utc(2026, 2, 15, 0, 0)),
        )
        .await
        .expect("query succeeds");
    assert_eq!(due_soon.len(), 1);
    assert_eq!(
        due_soon.first().map(|task| task.title().as_str().to_owned()),
        Some("Pay rent".to_owned())
    );

    let searched = repository
        .query(&owner_id, &TaskFilter::new().with_search("kitchen"))
        .await
        .expect("query succeeds");
    assert_eq!(searched.len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_sorts_by_due_date_keeping_dateless_tasks_last(
    repository: InMemoryTaskRepository,
) {
    seed_varied_tasks(&repository).await;
    let owner_id = owner("owner-1");

    let ascending = repository
        .query(
            &owner_id,
            &TaskFilter::new().sorted_by(SortField::DueAt, SortOrder::Asc),
        )
        .await
        .expect("query succeeds");
    let titles: Vec<&str> = ascending.iter().map(|task| task.title().as_str()).collect();
    assert_eq!(titles, vec!["Pay rent", "Clean kitchen", "File taxes"]);

    let descending = repository
        .query(
            &owner_id,
            &TaskFilter::new().sorted_by(SortField::DueAt, SortOrder::Desc),
        )
        .await
        .expect("query succeeds");
    let reversed: Vec<&str> = descending
        .iter()
        .map(|task| task.title().as_str())
        .collect();
    assert_eq!(reversed, vec!["Clean kitchen", "Pay rent", "File taxes"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_is_scoped_to_the_owner(repository: InMemoryTaskRepository) {
    seed_varied_tasks(&repository).await;
    let foreign = repository
        .query(&owner("owner-2"), &TaskFilter::new())
        .await
        .expect("query succeeds");
    assert!(foreign.is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reminder_invariants_survive_storage(repository: InMemoryTaskRepository) {
    let due = utc(2026, 3, 1, 17, 0);
    let task = scheduled_task("Call dentist", due, Some(utc(2026, 3, 1, 16, 0)), None);
    repository.insert(&task).await.expect("insert succeeds");

    let fetched = repository
        .find(task.owner_id(), task.id())
        .await
        .expect("find succeeds")
        .expect("task present");
    assert_eq!(fetched.remind_at(), Some(utc(2026, 3, 1, 16, 0)));
    assert_eq!(fetched.due_at(), Some(due));
}
