//! Taskloom: event-driven task lifecycle orchestration.
//!
//! This crate turns every task mutation into a durable lifecycle event and
//! propagates it to a set of independent, idempotent consumers: a
//! recurrence engine, an audit recorder, and a real-time fanout, with a
//! reminder scheduler bridging to an external timer service.
//!
//! # Architecture
//!
//! Taskloom follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external collaborators (the
//!   state store, the event bus, the timer service, push channels)
//! - **Adapters**: Concrete implementations of ports (in-memory)
//!
//! # Modules
//!
//! - [`task`]: Task aggregate, task store, event publishing, reminders
//! - [`recurrence`]: Regeneration of recurring tasks on completion
//! - [`audit`]: Append-only audit trail derived from lifecycle events
//! - [`realtime`]: Per-owner broadcast of change notifications
//! - [`command`]: Structured command boundary for conversational clients

pub mod audit;
pub mod command;
pub mod realtime;
pub mod recurrence;
pub mod task;
