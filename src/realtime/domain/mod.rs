//! Domain types for real-time change notifications.

mod notification;

pub use notification::{ChangeNotification, ConnectionId};
