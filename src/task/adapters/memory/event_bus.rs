//! In-memory event bus with per-group delivery tracking.
//!
//! Models the external transport's contract closely enough for tests:
//! broadcast to independently subscribed consumer groups, at-least-once
//! delivery with acknowledgement tracking, redelivery of unacknowledged
//! messages on re-subscription (consumer restart) or on demand, and a
//! switchable unreachable mode to exercise retry paths.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::task::domain::TaskId;
use crate::task::ports::{Delivery, DeliveryToken, EventBus, EventBusError, EventBusResult, Subscription};

#[derive(Debug)]
struct GroupState {
    sender: UnboundedSender<Delivery>,
    /// Unacknowledged payloads, keyed by token in publish order.
    pending: BTreeMap<u64, Value>,
}

#[derive(Debug, Default)]
struct BusState {
    /// topic -> consumer group -> delivery state.
    groups: HashMap<String, HashMap<String, GroupState>>,
    /// Per-topic log of accepted payloads, in publish order.
    published: HashMap<String, Vec<Value>>,
    next_token: u64,
    unreachable: bool,
}

/// Thread-safe in-memory event bus.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryEventBus {
    /// Creates an empty in-memory bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches the bus into (or out of) unreachable mode; while set,
    /// every publish fails with [`EventBusError::Unreachable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock_state().unreachable = unreachable;
    }

    /// Returns the payloads accepted on a topic, in publish order.
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<Value> {
        self.lock_state()
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the number of unacknowledged deliveries for a group.
    #[must_use]
    pub fn pending_count(&self, topic: &str, consumer_group: &str) -> usize {
        self.lock_state()
            .groups
            .get(topic)
            .and_then(|groups| groups.get(consumer_group))
            .map_or(0, |group| group.pending.len())
    }

    /// Re-sends every unacknowledged delivery of a group through its
    /// current stream, in original publish order.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::UnknownGroup`] when the group has no
    /// subscription on the topic.
    pub fn redeliver_unacked(&self, topic: &str, consumer_group: &str) -> EventBusResult<usize> {
        let mut state = self.lock_state();
        let group = state
            .groups
            .get_mut(topic)
            .and_then(|groups| groups.get_mut(consumer_group))
            .ok_or_else(|| EventBusError::UnknownGroup {
                topic: topic.to_owned(),
                group: consumer_group.to_owned(),
            })?;
        let mut redelivered = 0;
        for (token, payload) in &group.pending {
            let delivery = Delivery {
                payload: payload.clone(),
                token: DeliveryToken::new(*token),
            };
            if group.sender.send(delivery).is_ok() {
                redelivered += 1;
            }
        }
        Ok(redelivered)
    }

    fn lock_state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        _partition_key: TaskId,
        payload: Value,
    ) -> EventBusResult<()> {
        let mut state = self.lock_state();
        if state.unreachable {
            return Err(EventBusError::Unreachable(
                "forced unreachable for test".to_owned(),
            ));
        }
        state
            .published
            .entry(topic.to_owned())
            .or_default()
            .push(payload.clone());
        let token = state.next_token;
        state.next_token += 1;
        if let Some(groups) = state.groups.get_mut(topic) {
            for group in groups.values_mut() {
                group.pending.insert(token, payload.clone());
                let delivery = Delivery {
                    payload: payload.clone(),
                    token: DeliveryToken::new(token),
                };
                // A dropped receiver only parks the message as pending;
                // it is redelivered when the group re-subscribes.
                drop(group.sender.send(delivery));
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, consumer_group: &str) -> EventBusResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.lock_state();
        let groups = state.groups.entry(topic.to_owned()).or_default();
        let pending = groups
            .remove(consumer_group)
            .map(|group| group.pending)
            .unwrap_or_default();
        // Re-subscription models a consumer restart: everything the
        // previous incarnation failed to acknowledge is delivered again.
        for (token, payload) in &pending {
            let delivery = Delivery {
                payload: payload.clone(),
                token: DeliveryToken::new(*token),
            };
            drop(sender.send(delivery));
        }
        groups.insert(consumer_group.to_owned(), GroupState { sender, pending });
        Ok(Subscription::new(receiver))
    }

    async fn ack(
        &self,
        topic: &str,
        consumer_group: &str,
        token: DeliveryToken,
    ) -> EventBusResult<()> {
        let mut state = self.lock_state();
        let group = state
            .groups
            .get_mut(topic)
            .and_then(|groups| groups.get_mut(consumer_group))
            .ok_or_else(|| EventBusError::UnknownGroup {
                topic: topic.to_owned(),
                group: consumer_group.to_owned(),
            })?;
        group.pending.remove(&token.value());
        Ok(())
    }
}
