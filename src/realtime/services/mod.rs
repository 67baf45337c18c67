//! The change fanout service.

pub mod fanout;

pub use fanout::{CONSUMER_GROUP, ChangeFanout};
