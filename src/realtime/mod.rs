//! Real-time change broadcasting for Taskloom.
//!
//! This module consumes lifecycle events and pushes compact change
//! notifications to every live connection of the owning user. It is a
//! broadcast, not a queue: connections that are not live at delivery
//! time never see the notification, and clients reconcile with a full
//! list fetch on (re)connect. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - The fanout service in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
