//! Unit tests for the command context.
