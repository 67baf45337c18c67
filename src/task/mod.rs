//! Task lifecycle management for Taskloom.
//!
//! This module owns the mutation path: the task aggregate and its
//! optimistic-concurrency state machine, the task store service that makes
//! every successful mutation emit exactly one lifecycle event, the event
//! publisher that hands events to the bus in per-task order, and the
//! reminder scheduler that keeps the external timer service in step with
//! task state. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
