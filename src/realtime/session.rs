//! Session registry: connection id -> authenticated principal + sender.
//!
//! A connection becomes broadcast-addressable only once `register` has
//! bound it to a verified principal; a connection that never completes
//! handshake authentication is never inserted here.

use dashmap::DashMap;

use crate::auth::Principal;
use crate::realtime::{ConnectionId, ConnectionSender};

struct Session {
    principal: Principal,
    sender: ConnectionSender,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: DashMap<ConnectionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Bind a connection to its authenticated principal.
    /// Idempotent per connection id: re-registering replaces the binding.
    pub fn register(&self, id: ConnectionId, principal: Principal, sender: ConnectionSender) {
        self.inner.insert(id, Session { principal, sender });
    }

    /// Remove the binding for a connection. Safe to call multiple times.
    pub fn unregister(&self, id: ConnectionId) {
        self.inner.remove(&id);
    }

    /// Look up the principal bound to a connection.
    pub fn principal(&self, id: ConnectionId) -> Option<Principal> {
        self.inner.get(&id).map(|s| s.principal.clone())
    }

    /// Sender for a specific connection, if it is registered.
    pub fn sender(&self, id: ConnectionId) -> Option<ConnectionSender> {
        self.inner.get(&id).map(|s| s.sender.clone())
    }

    /// Number of live registered connections.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of every registered sender, for system-wide broadcasts.
    pub fn all_senders(&self) -> Vec<ConnectionSender> {
        self.inner.iter().map(|s| s.sender.clone()).collect()
    }
}
