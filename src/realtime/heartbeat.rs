//! System heartbeat: periodic liveness broadcast to every connection,
//! independent of room membership and of any single connection's
//! lifecycle. Runs from subsystem start until process shutdown.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::realtime::event::ServerEvent;
use crate::state::AppState;

/// Spawn the heartbeat emitter. Every `period`, broadcasts a
/// `system_heartbeat` event carrying the server timestamp and the count
/// of live connections.
pub fn spawn(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = interval(period);
        // Skip the first immediate tick
        timer.tick().await;

        loop {
            timer.tick().await;

            let event = ServerEvent::SystemHeartbeat {
                timestamp: Utc::now().to_rfc3339(),
                connected_users: state.sessions.len(),
            };
            let msg = event.to_message();

            for sender in state.sessions.all_senders() {
                let _ = sender.send(msg.clone());
            }
        }
    })
}
