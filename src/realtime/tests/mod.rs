//! Unit tests for the realtime context.

mod fanout_tests;
