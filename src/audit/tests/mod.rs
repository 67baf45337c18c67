//! Unit tests for the audit context.
