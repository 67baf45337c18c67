//! Unit tests for the task context.

mod reminder_tests;
mod repository_tests;
mod support;
