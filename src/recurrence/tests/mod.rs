//! Unit tests for the recurrence context.

mod engine_tests;
