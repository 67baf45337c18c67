//! Broadcasts change notifications to live connections per owner.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::realtime::domain::{ChangeNotification, ConnectionId};
use crate::realtime::ports::PushChannel;
use crate::task::domain::{EventId, LifecycleEvent, OwnerId};
use crate::task::ports::{EventBus, Subscription, TOPIC_TASK_EVENTS};

/// Consumer group name on the lifecycle topic.
pub const CONSUMER_GROUP: &str = "realtime";

/// Bounded set of recently seen event ids.
///
/// Keeps redelivered events from reaching clients twice; the capacity
/// only needs to exceed the transport's redelivery window.
#[derive(Debug, Default)]
struct RecentEvents {
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
}

impl RecentEvents {
    const CAPACITY: usize = 1024;

    /// Marks an event as seen; returns `false` when it already was.
    fn mark(&mut self, event_id: EventId) -> bool {
        if !self.seen.insert(event_id) {
            return false;
        }
        self.order.push_back(event_id);
        while self.order.len() > Self::CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

struct Connection {
    id: ConnectionId,
    channel: Arc<dyn PushChannel>,
}

/// Broadcasts lifecycle changes to every live connection of the owning
/// user.
///
/// The connection registry is process-scoped with an explicit
/// register/unregister lifecycle tied to connection open and close.
/// There is no backlog: a connection that is not registered when an
/// event arrives never receives that notification.
#[derive(Clone, Default)]
pub struct ChangeFanout {
    connections: Arc<RwLock<HashMap<OwnerId, Vec<Connection>>>>,
    recent: Arc<Mutex<RecentEvents>>,
}

impl ChangeFanout {
    /// Creates a fanout with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live connection for an owner and returns its id.
    pub fn register(&self, owner_id: OwnerId, channel: Arc<dyn PushChannel>) -> ConnectionId {
        let id = ConnectionId::new();
        let mut registry = write_registry(&self.connections);
        registry
            .entry(owner_id.clone())
            .or_default()
            .push(Connection { id, channel });
        tracing::info!(
            owner_id = %owner_id,
            connection_id = %id,
            total_connections = count_connections(&registry),
            "client_connected"
        );
        id
    }

    /// Removes a connection; unknown ids are ignored.
    pub fn unregister(&self, owner_id: &OwnerId, connection_id: ConnectionId) {
        let mut registry = write_registry(&self.connections);
        remove_connection(&mut registry, owner_id, connection_id);
        tracing::info!(
            owner_id = %owner_id,
            connection_id = %connection_id,
            total_connections = count_connections(&registry),
            "client_disconnected"
        );
    }

    /// Returns the total number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        count_connections(&read_registry(&self.connections))
    }

    /// Pushes the event's change notification to every live connection
    /// of the owning user, pruning connections whose push fails.
    ///
    /// Redelivered events (same event id) are dropped without pushing.
    pub async fn handle_event(&self, event: &LifecycleEvent) {
        if !self
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mark(event.event_id())
        {
            tracing::debug!(event_id = %event.event_id(), "duplicate_event_dropped");
            return;
        }

        let targets: Vec<(ConnectionId, Arc<dyn PushChannel>)> = {
            let registry = read_registry(&self.connections);
            registry.get(event.owner_id()).map_or_else(Vec::new, |connections| {
                connections
                    .iter()
                    .map(|connection| (connection.id, Arc::clone(&connection.channel)))
                    .collect()
            })
        };
        if targets.is_empty() {
            tracing::debug!(owner_id = %event.owner_id(), "no_connections_for_owner");
            return;
        }

        let notification = ChangeNotification::from_event(event);
        let mut broken = Vec::new();
        for (connection_id, channel) in targets {
            if let Err(err) = channel.push(&notification).await {
                tracing::warn!(
                    owner_id = %event.owner_id(),
                    connection_id = %connection_id,
                    error = %err,
                    "push_failed"
                );
                broken.push(connection_id);
            }
        }
        if !broken.is_empty() {
            let mut registry = write_registry(&self.connections);
            for connection_id in broken {
                remove_connection(&mut registry, event.owner_id(), connection_id);
            }
        }
        tracing::info!(
            owner_id = %event.owner_id(),
            action = %event.kind(),
            task_id = %event.task_id(),
            "task_update_broadcast"
        );
    }

    /// Consumes the subscription until the transport closes it.
    ///
    /// Every delivery is acknowledged: a broadcast has no retryable
    /// failure mode, and duplicate suppression covers redeliveries that
    /// happen anyway.
    pub async fn run<B: EventBus>(&self, bus: &B, mut subscription: Subscription) {
        while let Some(delivery) = subscription.recv().await {
            match LifecycleEvent::from_payload(&delivery.payload) {
                Ok(event) => self.handle_event(&event).await,
                Err(err) => {
                    tracing::error!(error = %err, "malformed_event_dropped");
                }
            }
            if let Err(err) = bus
                .ack(TOPIC_TASK_EVENTS, CONSUMER_GROUP, delivery.token)
                .await
            {
                tracing::warn!(error = %err, "ack_failed");
            }
        }
    }
}

type Registry = HashMap<OwnerId, Vec<Connection>>;

fn read_registry(registry: &Arc<RwLock<Registry>>) -> std::sync::RwLockReadGuard<'_, Registry> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_registry(registry: &Arc<RwLock<Registry>>) -> std::sync::RwLockWriteGuard<'_, Registry> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}

fn count_connections(registry: &Registry) -> usize {
    registry.values().map(Vec::len).sum()
}

fn remove_connection(registry: &mut Registry, owner_id: &OwnerId, connection_id: ConnectionId) {
    if let Some(connections) = registry.get_mut(owner_id) {
        connections.retain(|connection| connection.id != connection_id);
        if connections.is_empty() {
            registry.remove(owner_id);
        }
    }
}
