//! Tri-state field patches for task updates.

use super::{Priority, RecurrenceRule, TaskDescription, TaskTitle};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Update intent for an optional task field.
///
/// Distinguishes "leave the stored value alone" from "clear the stored
/// value", which a bare `Option` cannot express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchField<T> {
    /// Keep the current value.
    #[default]
    Keep,
    /// Replace the current value.
    Set(T),
    /// Remove the current value.
    Clear,
}

impl<T> PatchField<T> {
    /// Resolves the patch against the currently stored value.
    #[must_use]
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Keep => current,
            Self::Set(value) => Some(value),
            Self::Clear => None,
        }
    }

    /// Returns `true` unless the field is left untouched.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Keep)
    }
}

/// Field-level patch applied by the task store's `update` operation.
///
/// Every populated field produces part of a single `updated` lifecycle
/// event; untouched fields keep their stored values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskPatch {
    /// Replacement title, if any.
    pub title: Option<TaskTitle>,
    /// Description update.
    pub description: PatchField<TaskDescription>,
    /// Replacement priority, if any.
    pub priority: Option<Priority>,
    /// Replacement tag set, if any.
    pub tags: Option<BTreeSet<String>>,
    /// Due date update.
    pub due_at: PatchField<DateTime<Utc>>,
    /// Reminder time update.
    pub remind_at: PatchField<DateTime<Utc>>,
    /// Recurrence rule update.
    pub recurrence: PatchField<RecurrenceRule>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a replacement title.
    #[must_use]
    pub fn with_title(mut self, title: TaskTitle) -> Self {
        self.title = Some(title);
        self
    }

    /// Sets a replacement description.
    #[must_use]
    pub fn with_description(mut self, description: TaskDescription) -> Self {
        self.description = PatchField::Set(description);
        self
    }

    /// Clears the description.
    #[must_use]
    pub fn clear_description(mut self) -> Self {
        self.description = PatchField::Clear;
        self
    }

    /// Sets a replacement priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets a replacement tag set.
    #[must_use]
    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Sets a replacement due date.
    #[must_use]
    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = PatchField::Set(due_at);
        self
    }

    /// Clears the due date.
    #[must_use]
    pub fn clear_due_at(mut self) -> Self {
        self.due_at = PatchField::Clear;
        self
    }

    /// Sets a replacement reminder time.
    #[must_use]
    pub fn with_remind_at(mut self, remind_at: DateTime<Utc>) -> Self {
        self.remind_at = PatchField::Set(remind_at);
        self
    }

    /// Clears the reminder time.
    #[must_use]
    pub fn clear_remind_at(mut self) -> Self {
        self.remind_at = PatchField::Clear;
        self
    }

    /// Sets a replacement recurrence rule.
    #[must_use]
    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = PatchField::Set(rule);
        self
    }

    /// Clears the recurrence rule.
    #[must_use]
    pub fn clear_recurrence(mut self) -> Self {
        self.recurrence = PatchField::Clear;
        self
    }

    /// Returns `true` when no field is touched by this patch.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && !self.description.is_change()
            && self.priority.is_none()
            && self.tags.is_none()
            && !self.due_at.is_change()
            && !self.remind_at.is_change()
            && !self.recurrence.is_change()
    }
}
