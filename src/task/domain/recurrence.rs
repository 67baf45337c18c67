//! Recurrence rules and due-date advancement.

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported recurrence cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    /// Repeats every calendar day.
    Daily,
    /// Repeats every seven calendar days.
    Weekly,
    /// Repeats on the same day-of-month, clamped to the last valid day.
    Monthly,
}

impl RecurrencePattern {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored recurrence rule governing automatic regeneration on completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pattern: RecurrencePattern,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    /// Creates a rule repeating indefinitely.
    #[must_use]
    pub const fn new(pattern: RecurrencePattern) -> Self {
        Self {
            pattern,
            until: None,
        }
    }

    /// Sets the date after which no further occurrence is generated.
    #[must_use]
    pub const fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Returns the recurrence cadence.
    #[must_use]
    pub const fn pattern(&self) -> RecurrencePattern {
        self.pattern
    }

    /// Returns the end date, if any.
    #[must_use]
    pub const fn until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    /// Returns `true` when `next_due` lies beyond the rule's end date.
    #[must_use]
    pub fn is_expired_at(&self, next_due: DateTime<Utc>) -> bool {
        self.until.is_some_and(|until| next_due > until)
    }
}

/// Advances a due date by one occurrence of the given pattern.
///
/// Daily and weekly advancement add calendar days, so the time-of-day is
/// preserved. Monthly advancement keeps the day-of-month and clamps to the
/// last valid day of the target month (Jan 31 + 1 month = Feb 28, or
/// Feb 29 in a leap year).
///
/// Returns `None` only when the result would overflow the representable
/// date range.
#[must_use]
pub fn advance(due_at: DateTime<Utc>, pattern: RecurrencePattern) -> Option<DateTime<Utc>> {
    match pattern {
        RecurrencePattern::Daily => due_at.checked_add_days(Days::new(1)),
        RecurrencePattern::Weekly => due_at.checked_add_days(Days::new(7)),
        RecurrencePattern::Monthly => due_at.checked_add_months(Months::new(1)),
    }
}
