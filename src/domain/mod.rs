//! Domain layer: connection identity, connection handles, outbound
//! messages and the connection registry.
//!
//! The registry's membership map is the only shared mutable state in the
//! chat core; everything else here is either immutable or owned by a single
//! connection task.

pub mod connection;
pub mod connection_id;
pub mod message;
pub mod registry;

pub use connection::{Connection, ConnectionState, Liveness, OutboundQueue};
pub use connection_id::ConnectionId;
pub use message::{BroadcastMessage, ChatEvent, Origin, PrivateNotice};
pub use registry::{BroadcastReport, ConnectionRegistry, RegistrationHandle, SharedRegistry};
