//! Port contracts for real-time delivery.

pub mod push;

pub use push::{PushChannel, PushError, PushResult};
