//! The command dispatcher service.

pub mod dispatcher;

pub use dispatcher::{CommandDispatcher, CommandError, CommandResult};
