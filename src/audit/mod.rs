//! Append-only audit trail for Taskloom.
//!
//! This module consumes every lifecycle event and appends exactly one
//! immutable audit entry per distinct event, deduplicating redeliveries
//! by source event id. Entries carry a field diff against the previous
//! known snapshot of the task. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The recorder service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
