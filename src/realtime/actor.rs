use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::auth::Principal;
use crate::realtime::bus::EventBus;
use crate::realtime::event::ClientEvent;
use crate::realtime::ConnectionId;
use crate::state::AppState;

/// Ping interval: server sends a WebSocket ping every 30 seconds to
/// reap connections that dropped without a close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: parses incoming events, dispatches through the bus
///
/// The mpsc channel allows any part of the system to push messages to
/// this client by cloning the sender. Registration in the session
/// registry happens before any event is processed, and the connection is
/// auto-joined to its organization and project rooms.
pub async fn run_connection(socket: WebSocket, state: AppState, principal: Principal) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let conn_id = ConnectionId::new();
    let user_id = principal.user_id.clone();

    state
        .sessions
        .register(conn_id, principal.clone(), tx.clone());
    state.rooms.auto_join(conn_id, &principal);

    let bus = EventBus::new(state.sessions.clone(), state.rooms.clone());

    tracing::info!(
        user_id = %user_id,
        connection_id = %conn_id,
        connections = state.sessions.len(),
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    dispatch_text_event(&bus, conn_id, &user_id, text.as_str());
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        user_id = %user_id,
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort helper tasks, then drop all registry state.
    // Both removals are idempotent.
    writer_handle.abort();
    ping_handle.abort();

    state.rooms.leave_all(conn_id);
    state.sessions.unregister(conn_id);

    tracing::info!(
        user_id = %user_id,
        connection_id = %conn_id,
        "WebSocket actor stopped"
    );
}

/// Parse one inbound text frame and publish it through the bus.
/// Malformed events (bad JSON, unknown tag, missing target topic) are
/// logged and dropped without being broadcast.
fn dispatch_text_event(bus: &EventBus, conn_id: ConnectionId, user_id: &str, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                error = %e,
                "Rejected malformed client event"
            );
            return;
        }
    };

    if let Err(e) = bus.publish(conn_id, event) {
        tracing::warn!(
            user_id = %user_id,
            error = %e,
            "Failed to publish client event"
        );
    }
}

/// Writer task: receives messages from the mpsc channel and forwards
/// them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
