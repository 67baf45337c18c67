//! Domain types for structured commands.

mod command;

pub use command::{Command, CommandOutcome};
