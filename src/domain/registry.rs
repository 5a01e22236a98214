//! Live connection membership and fan-out broadcast.
//!
//! [`ConnectionRegistry`] stores every `Open` connection in a
//! `RwLock<HashMap<...>>`. Broadcasts enumerate under the read lock and
//! enqueue into each connection's bounded outbound queue without awaiting,
//! so the lock is never held across a suspension point. Add and remove take
//! the write lock and therefore never interleave with an enumeration.
//!
//! # Ordering
//!
//! Broadcasts issued sequentially by one caller reach every surviving
//! recipient in issue order: the first is fully enqueued before the second
//! starts, and each queue is FIFO. Broadcasts from concurrent callers share
//! the read lock and may interleave arbitrarily; there is no cross-caller
//! ordering guarantee.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::connection::{Connection, ConnectionState};
use super::{BroadcastMessage, ConnectionId};
use crate::error::ChatError;

/// Proof of registration, returned by [`ConnectionRegistry::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationHandle {
    id: ConnectionId,
}

impl RegistrationHandle {
    /// Identifier of the registered connection.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Outcome of one broadcast. Purely informational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of connections the message was enqueued for.
    pub delivered: usize,
    /// Connections removed because delivery failed.
    pub evicted: Vec<ConnectionId>,
}

#[derive(Debug, Default)]
struct Members {
    connections: HashMap<ConnectionId, Connection>,
    closed: bool,
}

/// Set of live connections eligible to receive broadcasts.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: RwLock<Members>,
}

impl ConnectionRegistry {
    /// Creates an empty, open registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly accepted connection and marks it `Open`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::RegistryClosed`] once [`Self::close`] has been
    /// called, and [`ChatError::Internal`] if the id is already registered.
    pub async fn add(&self, connection: Connection) -> Result<RegistrationHandle, ChatError> {
        let id = connection.id();
        let mut members = self.members.write().await;
        if members.closed {
            return Err(ChatError::RegistryClosed);
        }
        if members.connections.contains_key(&id) {
            return Err(ChatError::Internal(format!(
                "connection {id} already registered"
            )));
        }
        connection.liveness().set(ConnectionState::Open);
        tracing::info!(conn_id = %id, client = connection.client_name(), "connection registered");
        members.connections.insert(id, connection);
        Ok(RegistrationHandle { id })
    }

    /// Removes a connection. Idempotent.
    ///
    /// Returns `true` if this call performed the removal. Once it returns,
    /// the connection's writer yields no further messages.
    pub async fn remove(&self, handle: &RegistrationHandle) -> bool {
        let removed = self.members.write().await.connections.remove(&handle.id);
        match removed {
            Some(conn) => {
                conn.liveness().set(ConnectionState::Closed);
                tracing::info!(conn_id = %handle.id, "connection removed");
                true
            }
            None => false,
        }
    }

    /// Delivers `message` to every registered connection.
    ///
    /// Never fails and never waits on a recipient. Connections whose queue
    /// is full or closed are evicted after enumeration.
    pub async fn broadcast(&self, message: &BroadcastMessage) -> BroadcastReport {
        let report = {
            let members = self.members.read().await;
            fan_out(&members, message)
        };
        self.finish(message, report).await
    }

    /// Broadcasts `message` on behalf of its client origin.
    ///
    /// The membership check and the enumeration run under one read lock, so
    /// a concurrent [`Self::remove`] of the sender either happens entirely
    /// before (nothing is sent, `None`) or entirely after the fan-out.
    /// Host-originated messages are always delivered.
    pub async fn publish(&self, message: &BroadcastMessage) -> Option<BroadcastReport> {
        let report = {
            let members = self.members.read().await;
            let departed = message
                .origin()
                .connection_id()
                .filter(|id| !members.connections.contains_key(id));
            if let Some(sender) = departed {
                tracing::debug!(
                    conn_id = %sender,
                    kind = message.event().kind(),
                    "sender no longer registered, dropping message"
                );
                return None;
            }
            fan_out(&members, message)
        };
        Some(self.finish(message, report).await)
    }

    async fn finish(&self, message: &BroadcastMessage, report: BroadcastReport) -> BroadcastReport {
        tracing::debug!(
            kind = message.event().kind(),
            recipients = report.delivered,
            evicted = report.evicted.len(),
            "broadcast"
        );
        if !report.evicted.is_empty() {
            self.evict(&report.evicted).await;
        }
        report
    }

    /// Delivers `text` to a single connection.
    ///
    /// Returns `false` if the connection is not registered or delivery
    /// failed, in which case it is evicted.
    pub async fn send_to(&self, id: ConnectionId, text: &Arc<str>) -> bool {
        let outcome = {
            let members = self.members.read().await;
            members.connections.get(&id).map(|conn| conn.try_deliver(text))
        };
        match outcome {
            Some(Ok(())) => true,
            Some(Err(reason)) => {
                tracing::warn!(conn_id = %id, %reason, "direct delivery failed");
                self.evict(&[id]).await;
                false
            }
            None => false,
        }
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.members.read().await.connections.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.connections.is_empty()
    }

    /// Returns `true` once the registry is shutting down.
    pub async fn is_closed(&self) -> bool {
        self.members.read().await.closed
    }

    /// Starts shutdown: rejects further registrations and drops every
    /// member, which ends their writer tasks. Returns how many were dropped.
    pub async fn close(&self) -> usize {
        let mut members = self.members.write().await;
        members.closed = true;
        let count = members.connections.len();
        for (_, conn) in members.connections.drain() {
            conn.liveness().set(ConnectionState::Closed);
        }
        tracing::info!(dropped = count, "registry closed");
        count
    }

    async fn evict(&self, ids: &[ConnectionId]) {
        let mut members = self.members.write().await;
        for id in ids {
            if let Some(conn) = members.connections.remove(id) {
                conn.liveness().set(ConnectionState::Closed);
            }
        }
    }
}

fn fan_out(members: &Members, message: &BroadcastMessage) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for conn in members.connections.values() {
        match conn.try_deliver(message.text()) {
            Ok(()) => report.delivered += 1,
            Err(reason) => {
                tracing::warn!(conn_id = %conn.id(), %reason, "broadcast delivery failed");
                report.evicted.push(conn.id());
            }
        }
    }
    report
}

/// Convenience alias used by handlers and the dispatcher.
pub type SharedRegistry = Arc<ConnectionRegistry>;

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::connection::OutboundQueue;
    use crate::domain::{ChatEvent, Origin};

    fn host_message(text: &str) -> BroadcastMessage {
        BroadcastMessage::new(Origin::Host, ChatEvent::Said { text: text.into() })
    }

    async fn register(
        registry: &ConnectionRegistry,
        name: &str,
        capacity: usize,
    ) -> (RegistrationHandle, OutboundQueue) {
        let (conn, rx) = Connection::new(name, capacity);
        let Ok(handle) = registry.add(conn).await else {
            panic!("registration failed");
        };
        (handle, rx)
    }

    async fn recv_text(rx: &mut OutboundQueue) -> String {
        let Some(text) = rx.next().await else {
            panic!("expected a message");
        };
        text.to_string()
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = register(&registry, "a", 8).await;
        let (_b, mut rx_b) = register(&registry, "b", 8).await;

        let report = registry.broadcast(&host_message("hi")).await;
        assert_eq!(report.delivered, 2);
        assert!(report.evicted.is_empty());
        assert_eq!(recv_text(&mut rx_a).await, "Moderator says: hi");
        assert_eq!(recv_text(&mut rx_b).await, "Moderator says: hi");
    }

    #[tokio::test]
    async fn failing_member_is_evicted_and_others_still_receive() {
        let registry = ConnectionRegistry::new();
        let (a, rx_a) = register(&registry, "a", 8).await;
        let (_b, mut rx_b) = register(&registry, "b", 8).await;
        let (_c, mut rx_c) = register(&registry, "c", 8).await;
        drop(rx_a);

        let report = registry.broadcast(&host_message("hi")).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.evicted, vec![a.id()]);
        assert!(!registry.remove(&a).await);
        assert_eq!(registry.len().await, 2);
        assert_eq!(recv_text(&mut rx_b).await, "Moderator says: hi");
        assert_eq!(recv_text(&mut rx_c).await, "Moderator says: hi");
    }

    #[tokio::test]
    async fn slow_consumer_is_evicted_without_blocking() {
        let registry = ConnectionRegistry::new();
        let (slow, _rx_slow) = register(&registry, "slow", 1).await;
        let (_fast, mut rx_fast) = register(&registry, "fast", 8).await;

        registry.broadcast(&host_message("one")).await;
        let report = registry.broadcast(&host_message("two")).await;
        assert_eq!(report.evicted, vec![slow.id()]);
        assert_eq!(recv_text(&mut rx_fast).await, "Moderator says: one");
        assert_eq!(recv_text(&mut rx_fast).await, "Moderator says: two");
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (a, _rx) = register(&registry, "a", 8).await;
        assert!(registry.remove(&a).await);
        assert!(!registry.remove(&a).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn removed_member_receives_nothing_afterwards() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = register(&registry, "a", 8).await;
        let (_b, mut rx_b) = register(&registry, "b", 8).await;

        registry.broadcast(&host_message("before")).await;
        assert!(registry.remove(&a).await);
        registry.broadcast(&host_message("after")).await;

        // Buffered messages are suppressed once the connection is closed.
        assert!(rx_a.next().await.is_none());
        assert_eq!(recv_text(&mut rx_b).await, "Moderator says: before");
        assert_eq!(recv_text(&mut rx_b).await, "Moderator says: after");
    }

    #[tokio::test]
    async fn remove_racing_with_broadcasts_stops_delivery() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, mut rx_a) = register(&registry, "a", 1024).await;

        let broadcaster = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..200 {
                    registry.broadcast(&host_message(&i.to_string())).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        tokio::task::yield_now().await;
        registry.remove(&a).await;

        assert!(rx_a.next().await.is_none());
        let Ok(()) = broadcaster.await else {
            panic!("broadcaster panicked");
        };
    }

    #[tokio::test]
    async fn sequential_broadcasts_arrive_in_order() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = register(&registry, "a", 64).await;
        let (_b, mut rx_b) = register(&registry, "b", 64).await;

        for i in 0..20 {
            registry.broadcast(&host_message(&i.to_string())).await;
        }
        for rx in [&mut rx_a, &mut rx_b] {
            for i in 0..20 {
                assert_eq!(recv_text(rx).await, format!("Moderator says: {i}"));
            }
        }
    }

    #[tokio::test]
    async fn concurrent_broadcasters_only_keep_per_caller_order() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (_a, mut rx_a) = register(&registry, "a", 256).await;

        let mut tasks = Vec::new();
        for sender in ["x", "y"] {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                for i in 0..50 {
                    registry
                        .broadcast(&host_message(&format!("{sender}{i}")))
                        .await;
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            let Ok(()) = task.await else {
                panic!("broadcaster panicked");
            };
        }

        // The interleaving of x and y is unspecified; only each sender's
        // own sequence must be intact.
        let mut next_x = 0;
        let mut next_y = 0;
        for _ in 0..100 {
            let text = recv_text(&mut rx_a).await;
            let Some(body) = text.strip_prefix("Moderator says: ") else {
                panic!("unexpected message {text}");
            };
            if let Some(n) = body.strip_prefix('x') {
                assert_eq!(n, next_x.to_string());
                next_x += 1;
            } else if let Some(n) = body.strip_prefix('y') {
                assert_eq!(n, next_y.to_string());
                next_y += 1;
            } else {
                panic!("unexpected body {body}");
            }
        }
        assert_eq!((next_x, next_y), (50, 50));
    }

    #[tokio::test]
    async fn closed_registry_rejects_registration() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = register(&registry, "a", 8).await;
        assert_eq!(registry.close().await, 1);
        assert!(registry.is_closed().await);
        assert!(rx_a.next().await.is_none());

        let (conn, _rx) = Connection::new("late", 8);
        let result = registry.add(conn).await;
        assert!(matches!(result, Err(ChatError::RegistryClosed)));
    }

    #[tokio::test]
    async fn send_to_targets_one_member() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = register(&registry, "a", 8).await;
        let (_b, _rx_b) = register(&registry, "b", 8).await;

        let text: Arc<str> = Arc::from("private");
        assert!(registry.send_to(a.id(), &text).await);
        assert_eq!(recv_text(&mut rx_a).await, "private");
        assert!(!registry.send_to(ConnectionId::new(), &text).await);
    }

    fn said_by(handle: &RegistrationHandle, text: &str) -> BroadcastMessage {
        BroadcastMessage::new(
            Origin::Client {
                id: handle.id(),
                name: "a".into(),
            },
            ChatEvent::Said { text: text.into() },
        )
    }

    #[tokio::test]
    async fn publish_requires_registered_sender() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = register(&registry, "a", 8).await;
        let (_b, mut rx_b) = register(&registry, "b", 8).await;

        let Some(report) = registry.publish(&said_by(&a, "first")).await else {
            panic!("registered sender was refused");
        };
        assert_eq!(report.delivered, 2);
        assert_eq!(recv_text(&mut rx_b).await, "Client #a says: first");

        registry.remove(&a).await;
        assert!(registry.publish(&said_by(&a, "late")).await.is_none());
        assert!(registry.publish(&host_message("host")).await.is_some());
        assert_eq!(recv_text(&mut rx_b).await, "Moderator says: host");
    }

    #[tokio::test]
    async fn publish_racing_with_remove_never_follows_departure() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (a, _rx_a) = register(&registry, "a", 1024).await;
        let (_b, mut rx_b) = register(&registry, "b", 1024).await;

        let publisher = {
            let registry = Arc::clone(&registry);
            let a = a.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    registry.publish(&said_by(&a, &i.to_string())).await;
                    tokio::task::yield_now().await;
                }
            })
        };
        tokio::task::yield_now().await;
        registry.remove(&a).await;
        let departure = BroadcastMessage::new(
            Origin::Client {
                id: a.id(),
                name: "a".into(),
            },
            ChatEvent::Left,
        );
        registry.broadcast(&departure).await;
        let Ok(()) = publisher.await else {
            panic!("publisher panicked");
        };

        loop {
            let text = recv_text(&mut rx_b).await;
            if text == "Client #a left the chat" {
                break;
            }
            assert!(text.starts_with("Client #a says: "));
        }
        let mut rest = tokio_test::task::spawn(rx_b.next());
        tokio_test::assert_pending!(rest.poll());
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let report = registry.broadcast(&host_message("anyone?")).await;
        assert_eq!(report, BroadcastReport::default());
    }
}
