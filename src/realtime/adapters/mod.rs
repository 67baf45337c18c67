//! Adapter implementations of the real-time ports.

pub mod memory;
