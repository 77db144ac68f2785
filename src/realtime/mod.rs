pub mod actor;
pub mod bus;
pub mod event;
pub mod handler;
pub mod heartbeat;
pub mod rooms;
pub mod session;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque identifier for one live WebSocket connection.
/// A user can hold several concurrently (multiple devices/tabs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Sender half of a connection's outbound channel. Any part of the
/// system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;
