//! Port contracts for the recurrence engine.

pub mod creator;
pub mod ledger;

pub use creator::{TaskCreator, TaskCreatorError, TaskCreatorResult};
pub use ledger::{CompletionLedger, LedgerError, LedgerResult};
