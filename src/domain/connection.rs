//! A single client connection as seen by the registry.
//!
//! A [`Connection`] owns the sending half of a bounded outbound queue. The
//! matching [`OutboundQueue`] is drained by the connection's writer task,
//! which is the only place that touches the transport sink. Delivery into
//! the queue never blocks: a full queue means a slow consumer, a closed one
//! means the writer is gone, and both count as a failed send.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;

use super::ConnectionId;

/// Lifecycle of one connection.
///
/// `Connecting → Open → Closing → Closed`. A connection is a registry
/// member iff its state is `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport accepted, not yet registered.
    Connecting,
    /// Registered and eligible for broadcasts.
    Open,
    /// Disconnect observed, teardown in progress.
    Closing,
    /// Removed from the registry. Terminal.
    Closed,
}

impl ConnectionState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Shared, lock-free view of a connection's [`ConnectionState`].
///
/// Cloned between the registry entry, the writer task and the session
/// dispatcher so all three agree on liveness.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicU8>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ConnectionState::Connecting.to_u8())))
    }

    /// Returns the current state.
    #[must_use]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Overwrites the current state.
    pub fn set(&self, state: ConnectionState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Returns `true` while the connection is `Open`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}

/// Why a non-blocking delivery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The outbound queue is full; the consumer is not keeping up.
    SlowConsumer,
    /// The writer task has exited; the transport is gone.
    Disconnected,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlowConsumer => f.write_str("outbound queue full"),
            Self::Disconnected => f.write_str("outbound queue closed"),
        }
    }
}

/// Registry-owned handle to one client's outbound channel.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    client_name: String,
    liveness: Liveness,
    outbound: mpsc::Sender<Arc<str>>,
}

impl Connection {
    /// Creates a connection in the `Connecting` state with a fresh
    /// [`ConnectionId`], returning it together with the receiving half of
    /// its outbound queue.
    ///
    /// `capacity` is clamped to at least 1.
    #[must_use]
    pub fn new(client_name: impl Into<String>, capacity: usize) -> (Self, OutboundQueue) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let liveness = Liveness::new();
        let conn = Self {
            id: ConnectionId::new(),
            client_name: client_name.into(),
            liveness: liveness.clone(),
            outbound,
        };
        (conn, OutboundQueue { rx, liveness })
    }

    /// Server-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Client-chosen display name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Shared liveness handle.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Enqueues `text` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryFailure`] if the queue is full or its receiver has
    /// been dropped.
    pub fn try_deliver(&self, text: &Arc<str>) -> Result<(), DeliveryFailure> {
        self.outbound
            .try_send(Arc::clone(text))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryFailure::SlowConsumer,
                mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Disconnected,
            })
    }
}

/// Receiving half of a connection's outbound queue.
///
/// Owned by the writer task. Yields nothing once the connection has left
/// the `Open` state, even if messages are still buffered.
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Arc<str>>,
    liveness: Liveness,
}

impl OutboundQueue {
    /// Waits for the next message destined to the client.
    ///
    /// Returns `None` when the registry dropped the sender or the
    /// connection is no longer `Open`.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        let msg = self.rx.recv().await?;
        self.liveness.is_open().then_some(msg)
    }

    /// Returns `true` while the connection is still `Open`.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.liveness.is_open()
    }

    /// Closes the queue so no further messages can be enqueued.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
