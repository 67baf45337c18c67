//! Event bus port with per-key ordering and at-least-once delivery.

use crate::task::domain::TaskId;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

/// Topic carrying every task lifecycle event.
pub const TOPIC_TASK_EVENTS: &str = "task-events";

/// Topic carrying reminder-due events for the notification path.
pub const TOPIC_REMINDERS: &str = "reminders";

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Opaque handle identifying one delivery for acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryToken(u64);

impl DeliveryToken {
    /// Creates a token from a transport-assigned sequence number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the transport-assigned sequence number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeliveryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One message handed to a consumer group.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Serialized event payload.
    pub payload: Value,
    /// Token to acknowledge after successful idempotent processing.
    pub token: DeliveryToken,
}

/// Ordered stream of deliveries for one consumer group.
///
/// Deliveries sharing a partition key arrive in publish order; a message
/// that is never acknowledged is redelivered by the transport after a
/// consumer restart.
#[derive(Debug)]
pub struct Subscription {
    receiver: UnboundedReceiver<Delivery>,
}

impl Subscription {
    /// Wraps a transport-provided delivery channel.
    #[must_use]
    pub const fn new(receiver: UnboundedReceiver<Delivery>) -> Self {
        Self { receiver }
    }

    /// Waits for the next delivery; returns `None` once the transport
    /// closes the stream.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

/// Event bus contract.
///
/// Delivery is at-least-once: consumers must tolerate redelivery of any
/// message they have not acknowledged, and may see acknowledged messages
/// again after transport failover. Ordering is guaranteed only among
/// messages sharing a partition key.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publishes a payload to every consumer group of the topic, routed
    /// by partition key.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Unreachable`] when the transport cannot
    /// accept the message; callers retry with backoff.
    async fn publish(
        &self,
        topic: &str,
        partition_key: TaskId,
        payload: Value,
    ) -> EventBusResult<()>;

    /// Registers a consumer group on a topic and returns its delivery
    /// stream. Subscribing an existing group replaces its stream.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Unreachable`] when the transport cannot
    /// register the group.
    async fn subscribe(&self, topic: &str, consumer_group: &str) -> EventBusResult<Subscription>;

    /// Acknowledges a delivery after successful idempotent processing;
    /// unacknowledged deliveries are eventually redelivered.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::UnknownGroup`] when the consumer group
    /// has no subscription on the topic.
    async fn ack(
        &self,
        topic: &str,
        consumer_group: &str,
        token: DeliveryToken,
    ) -> EventBusResult<()>;
}

/// Errors returned by event bus implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventBusError {
    /// The transport is temporarily unable to accept the request.
    #[error("event bus unreachable: {0}")]
    Unreachable(String),

    /// The consumer group is not subscribed on the topic.
    #[error("unknown consumer group '{group}' on topic '{topic}'")]
    UnknownGroup {
        /// Topic name.
        topic: String,
        /// Consumer group name.
        group: String,
    },
}
