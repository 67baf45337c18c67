//! Recording in-memory push channel.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::realtime::domain::ChangeNotification;
use crate::realtime::ports::{PushChannel, PushError, PushResult};

#[derive(Debug, Default)]
struct ChannelState {
    pushed: Vec<ChangeNotification>,
    closed: bool,
}

/// In-memory push channel recording everything it receives.
///
/// Closing the channel makes every subsequent push fail, which is how
/// tests exercise connection pruning.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPushChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl InMemoryPushChannel {
    /// Creates an open channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the channel as closed; subsequent pushes fail.
    pub fn close(&self) {
        self.lock_state().closed = true;
    }

    /// Returns everything pushed so far, in delivery order.
    #[must_use]
    pub fn pushed(&self) -> Vec<ChangeNotification> {
        self.lock_state().pushed.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PushChannel for InMemoryPushChannel {
    async fn push(&self, notification: &ChangeNotification) -> PushResult<()> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(PushError::Closed("channel closed".to_owned()));
        }
        state.pushed.push(notification.clone());
        Ok(())
    }
}
