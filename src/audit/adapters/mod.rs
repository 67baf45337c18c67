//! Adapter implementations of the audit ports.

pub mod memory;
