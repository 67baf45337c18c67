//! Shared builders for task context tests.

use chrono::{DateTime, TimeZone, Utc};
use mockable::DefaultClock;

use crate::task::domain::{
    NewTaskData, OwnerId, RecurrenceRule, Task, TaskDescription, TaskTitle,
};

/// Builds an owner id, panicking on invalid input.
pub fn owner(value: &str) -> OwnerId {
    OwnerId::new(value).expect("valid owner id")
}

/// Builds a UTC timestamp, panicking on invalid input.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

/// Builds task data with the given title and defaults elsewhere.
pub fn task_data(title: &str) -> NewTaskData {
    NewTaskData::new(TaskTitle::new(title).expect("valid title"))
}

/// Builds a pending task owned by `owner-1`.
pub fn sample_task(title: &str) -> Task {
    Task::create(owner("owner-1"), task_data(title), &DefaultClock).expect("valid task")
}

/// Builds a pending task with a schedule.
pub fn scheduled_task(
    title: &str,
    due_at: DateTime<Utc>,
    remind_at: Option<DateTime<Utc>>,
    recurrence: Option<RecurrenceRule>,
) -> Task {
    let mut data = task_data(title);
    data.due_at = Some(due_at);
    data.remind_at = remind_at;
    data.recurrence = recurrence;
    Task::create(owner("owner-1"), data, &DefaultClock).expect("valid task")
}

/// Builds a description, panicking on invalid input.
pub fn description(value: &str) -> TaskDescription {
    TaskDescription::new(value).expect("valid description")
}
