use std::sync::Arc;

use crate::gateway::proxy::ServiceDirectory;
use crate::realtime::rooms::RoomRouter;
use crate::realtime::session::SessionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Shared secret for verifying bearer tokens
    pub jwt_secret: Vec<u8>,
    /// Live WebSocket connections and their principals
    pub sessions: Arc<SessionRegistry>,
    /// Topic -> connection-set room membership
    pub rooms: Arc<RoomRouter>,
    /// Backing services reachable behind the gateway
    pub services: Arc<ServiceDirectory>,
}

impl AppState {
    pub fn new(jwt_secret: Vec<u8>, services: Arc<ServiceDirectory>) -> Self {
        Self {
            jwt_secret,
            sessions: Arc::new(SessionRegistry::new()),
            rooms: Arc::new(RoomRouter::new()),
            services,
        }
    }
}
