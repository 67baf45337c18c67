//! Task aggregate root and related lifecycle types.

use super::{
    AlreadyCompleted, OwnerId, RecurrenceRule, TaskDescription, TaskDomainError, TaskId, TaskPatch,
    TaskTitle, TaskVersion,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Task completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is awaiting completion.
    Pending,
    /// Task has been completed.
    Completed,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Needs attention before everything else.
    High,
    /// Ordinary priority.
    #[default]
    Medium,
    /// Can wait.
    Low,
}

impl Priority {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Numeric rank used for sorting; higher means more urgent.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::High => 2,
            Self::Medium => 1,
            Self::Low => 0,
        }
    }
}

/// Parameter object carrying the validated fields of a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskData {
    /// Task title.
    pub title: TaskTitle,
    /// Optional free-form description.
    pub description: Option<TaskDescription>,
    /// Priority level.
    pub priority: Priority,
    /// Initial tag set.
    pub tags: BTreeSet<String>,
    /// Optional due date.
    pub due_at: Option<DateTime<Utc>>,
    /// Optional reminder time.
    pub remind_at: Option<DateTime<Utc>>,
    /// Optional recurrence rule.
    pub recurrence: Option<RecurrenceRule>,
}

impl NewTaskData {
    /// Creates task data with the given title and defaults elsewhere.
    #[must_use]
    pub const fn new(title: TaskTitle) -> Self {
        Self {
            title,
            description: None,
            priority: Priority::Medium,
            tags: BTreeSet::new(),
            due_at: None,
            remind_at: None,
            recurrence: None,
        }
    }
}

/// Task aggregate root.
///
/// All mutations go through methods that enforce the schedule invariants
/// and bump the optimistic-concurrency version counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    owner_id: OwnerId,
    title: TaskTitle,
    description: Option<TaskDescription>,
    status: TaskStatus,
    priority: Priority,
    tags: BTreeSet<String>,
    due_at: Option<DateTime<Utc>>,
    remind_at: Option<DateTime<Utc>>,
    recurrence: Option<RecurrenceRule>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    version: TaskVersion,
}

impl Task {
    /// Creates a new pending task at version 1.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ReminderAfterDue`] when the reminder is
    /// later than the due date, or
    /// [`TaskDomainError::RecurrenceWithoutDueDate`] when a recurrence
    /// rule is supplied without a due date.
    pub fn create(
        owner_id: OwnerId,
        data: NewTaskData,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        validate_schedule(data.due_at, data.remind_at, data.recurrence.as_ref())?;
        let timestamp = clock.utc();
        Ok(Self {
            id: TaskId::new(),
            owner_id,
            title: data.title,
            description: data.description,
            status: TaskStatus::Pending,
            priority: data.priority,
            tags: data.tags,
            due_at: data.due_at,
            remind_at: data.remind_at,
            recurrence: data.recurrence,
            created_at: timestamp,
            updated_at: timestamp,
            completed_at: None,
            version: TaskVersion::initial(),
        })
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning user's identifier.
    #[must_use]
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Returns the task title.
    #[must_use]
    pub const fn title(&self) -> &TaskTitle {
        &self.title
    }

    /// Returns the task description, if any.
    #[must_use]
    pub const fn description(&self) -> Option<&TaskDescription> {
        self.description.as_ref()
    }

    /// Returns the completion status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns `true` while the task awaits completion.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Returns the priority level.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the tag set.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns the due date, if any.
    #[must_use]
    pub const fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    /// Returns the reminder time, if any.
    #[must_use]
    pub const fn remind_at(&self) -> Option<DateTime<Utc>> {
        self.remind_at
    }

    /// Returns the recurrence rule, if any.
    #[must_use]
    pub const fn recurrence(&self) -> Option<&RecurrenceRule> {
        self.recurrence.as_ref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest mutation timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the completion timestamp, if completed.
    #[must_use]
    pub const fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Returns the optimistic-concurrency version.
    #[must_use]
    pub const fn version(&self) -> TaskVersion {
        self.version
    }

    /// Applies a field patch, re-validating the schedule invariants and
    /// bumping the version.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::ReminderAfterDue`] or
    /// [`TaskDomainError::RecurrenceWithoutDueDate`] when the patched
    /// fields would violate the schedule invariants; the task is left
    /// unchanged in that case.
    pub fn apply_patch(
        &mut self,
        patch: TaskPatch,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        let next_description = patch.description.apply(self.description.clone());
        let next_due = patch.due_at.apply(self.due_at);
        let next_remind = patch.remind_at.apply(self.remind_at);
        let next_recurrence = patch.recurrence.apply(self.recurrence);
        validate_schedule(next_due, next_remind, next_recurrence.as_ref())?;

        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self.description = next_description;
        self.due_at = next_due;
        self.remind_at = next_remind;
        self.recurrence = next_recurrence;
        self.touch(clock);
        Ok(())
    }

    /// Marks the task completed, setting `completed_at` exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyCompleted`] when the task is already completed;
    /// no field changes and no version bump occur in that case.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<(), AlreadyCompleted> {
        if self.status == TaskStatus::Completed {
            return Err(AlreadyCompleted(self.id));
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(clock.utc());
        self.touch(clock);
        Ok(())
    }

    /// Returns `true` when the given text occurs in the title or
    /// description, case-insensitively.
    #[must_use]
    pub fn matches_text(&self, needle: &str) -> bool {
        let lowered = needle.to_lowercase();
        if self.title.as_str().to_lowercase().contains(&lowered) {
            return true;
        }
        self.description
            .as_ref()
            .is_some_and(|description| description.as_str().to_lowercase().contains(&lowered))
    }

    /// Updates `updated_at` and bumps the version.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
        self.version = self.version.next();
    }
}

/// Checks the cross-field schedule invariants.
fn validate_schedule(
    due_at: Option<DateTime<Utc>>,
    remind_at: Option<DateTime<Utc>>,
    recurrence: Option<&RecurrenceRule>,
) -> Result<(), TaskDomainError> {
    if let (Some(remind), Some(due)) = (remind_at, due_at)
        && remind > due
    {
        return Err(TaskDomainError::ReminderAfterDue {
            remind_at: remind,
            due_at: due,
        });
    }
    if recurrence.is_some() && due_at.is_none() {
        return Err(TaskDomainError::RecurrenceWithoutDueDate);
    }
    Ok(())
}
