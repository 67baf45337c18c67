//! Filter, sort, and pagination types for task queries.

use super::{Priority, Task, TaskStatus};
use chrono::{DateTime, Utc};

/// Sortable task attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// Sort by creation timestamp.
    #[default]
    CreatedAt,
    /// Sort by due date; tasks without one sort last.
    DueAt,
    /// Sort by priority rank.
    Priority,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order.
    Asc,
    /// Descending order.
    #[default]
    Desc,
}

/// Filter, sort, and pagination parameters for listing tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    /// Restrict to a completion status.
    pub status: Option<TaskStatus>,
    /// Restrict to a priority level.
    pub priority: Option<Priority>,
    /// Keep tasks carrying at least one of these tags.
    pub tags: Vec<String>,
    /// Keep tasks due strictly before this instant.
    pub due_before: Option<DateTime<Utc>>,
    /// Keep tasks due strictly after this instant.
    pub due_after: Option<DateTime<Utc>>,
    /// Case-insensitive free-text match over title and description.
    pub search: Option<String>,
    /// Sort attribute.
    pub sort_by: SortField,
    /// Sort direction.
    pub sort_order: SortOrder,
    /// 1-based page number.
    pub page: usize,
    /// Page size, clamped to [`Self::MAX_PAGE_SIZE`].
    pub page_size: usize,
}

impl TaskFilter {
    /// Default page size.
    pub const DEFAULT_PAGE_SIZE: usize = 20;
    /// Upper bound on the page size.
    pub const MAX_PAGE_SIZE: usize = 100;

    /// Creates an unrestricted filter with default sort and pagination.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status: None,
            priority: None,
            tags: Vec::new(),
            due_before: None,
            due_after: None,
            search: None,
            sort_by: SortField::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Restricts results to a completion status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts results to a priority level.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Keeps tasks carrying at least one of the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    /// Keeps tasks due strictly before the given instant.
    #[must_use]
    pub const fn with_due_before(mut self, due_before: DateTime<Utc>) -> Self {
        self.due_before = Some(due_before);
        self
    }

    /// Keeps tasks due strictly after the given instant.
    #[must_use]
    pub const fn with_due_after(mut self, due_after: DateTime<Utc>) -> Self {
        self.due_after = Some(due_after);
        self
    }

    /// Sets a case-insensitive free-text query.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Sets the sort attribute and direction.
    #[must_use]
    pub const fn sorted_by(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_by = field;
        self.sort_order = order;
        self
    }

    /// Sets the 1-based page number and page size.
    #[must_use]
    pub const fn paginated(mut self, page: usize, page_size: usize) -> Self {
        self.page = if page == 0 { 1 } else { page };
        self.page_size = clamp_page_size(page_size);
        self
    }

    /// Returns `true` when the task passes every predicate of this
    /// filter (pagination and sorting aside).
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.is_some_and(|status| task.status() != status) {
            return false;
        }
        if self
            .priority
            .is_some_and(|priority| task.priority() != priority)
        {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| task.tags().contains(tag)) {
            return false;
        }
        if !matches_due_range(task.due_at(), self.due_before, self.due_after) {
            return false;
        }
        self.search
            .as_ref()
            .is_none_or(|needle| task.matches_text(needle))
    }
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of task query results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPage {
    /// Tasks on this page.
    pub tasks: Vec<Task>,
    /// Total number of tasks matching the filter.
    pub total: usize,
    /// 1-based page number.
    pub page: usize,
    /// Page size used.
    pub page_size: usize,
}

const fn clamp_page_size(page_size: usize) -> usize {
    if page_size == 0 {
        TaskFilter::DEFAULT_PAGE_SIZE
    } else if page_size > TaskFilter::MAX_PAGE_SIZE {
        TaskFilter::MAX_PAGE_SIZE
    } else {
        page_size
    }
}

fn matches_due_range(
    due_at: Option<DateTime<Utc>>,
    due_before: Option<DateTime<Utc>>,
    due_after: Option<DateTime<Utc>>,
) -> bool {
    if due_before.is_none() && due_after.is_none() {
        return true;
    }
    due_at.is_some_and(|due| {
        due_before.is_none_or(|bound| due < bound) && due_after.is_none_or(|bound| due > bound)
    })
}
