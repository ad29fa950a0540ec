//! Relay (server) side: connection registry and type-scoped broadcast

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod server;

pub use broadcast::{DEFAULT_OUTBOUND_QUEUE, Delivery, Relay};
pub use connection::ConnectionHandler;
pub use registry::{ConnectionEntry, ConnectionId, ConnectionRegistry, Identity, Outbound};
pub use server::RelayServer;
