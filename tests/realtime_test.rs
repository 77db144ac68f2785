//! Integration tests for the realtime layer: handshake auth, room
//! membership, fan-out ordering, typing indicators, heartbeat, and
//! registry cleanup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use taskcore_gateway::auth::jwt;
use taskcore_gateway::config::Config;
use taskcore_gateway::gateway::proxy::ServiceDirectory;
use taskcore_gateway::gateway::routes::build_router;
use taskcore_gateway::realtime::heartbeat;
use taskcore_gateway::realtime::rooms::Topic;
use taskcore_gateway::state::AppState;

const TEST_SECRET: &[u8] = b"test-secret";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start the gateway on a random port. Returns the bound address and the
/// shared state so tests can inspect the registries directly.
async fn start_test_server(heartbeat_period: Option<Duration>) -> (SocketAddr, AppState) {
    let config = Config {
        jwt_secret: "test-secret".to_string(),
        ..Config::default()
    };
    let services = Arc::new(ServiceDirectory::with_stubs());
    let state = AppState::new(config.jwt_secret.clone().into_bytes(), services);

    if let Some(period) = heartbeat_period {
        heartbeat::spawn(state.clone(), period);
    }

    let app = build_router(state.clone(), &config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state)
}

fn token_for(user_id: &str, project_ids: &[&str]) -> String {
    jwt::issue_access_token(
        TEST_SECRET,
        user_id,
        &format!("{}@example.com", user_id),
        Some("org-1"),
        Some("member"),
        project_ids,
        900,
    )
    .expect("Failed to issue token")
}

async fn connect(addr: SocketAddr, token: &str) -> WsStream {
    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("Failed to connect to WebSocket");
    stream
}

/// Next JSON event on the stream, skipping ping frames.
async fn next_event(
    read: &mut futures_util::stream::SplitStream<WsStream>,
    deadline: Duration,
) -> Option<serde_json::Value> {
    loop {
        match tokio::time::timeout(deadline, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return serde_json::from_str(&text).ok();
            }
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

fn event_text(value: serde_json::Value) -> Message {
    Message::Text(value.to_string().into())
}

#[tokio::test]
async fn invalid_token_closes_with_auth_error() {
    let (addr, state) = start_test_server(None).await;

    let ws_url = format!("ws://{}/ws?token=invalid_jwt_token", addr);
    let (stream, _) = tokio_tungstenite::connect_async(&ws_url)
        .await
        .expect("WebSocket should upgrade even with an invalid token");
    let (_write, mut read) = stream.split();

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close message within timeout");

    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(
                frame.code,
                tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4002),
                "Expected close code 4002 (token invalid)"
            );
        }
        Some(Ok(Message::Close(None))) | None => {}
        other => panic!("Expected close, got: {:?}", other),
    }

    // Never authenticated: no session, no room membership
    assert_eq!(state.sessions.len(), 0);
    assert!(state.rooms.members(&Topic::Org("org-1".to_string())).is_empty());
}

#[tokio::test]
async fn expired_token_closes_with_expired_code() {
    let (addr, _state) = start_test_server(None).await;
    let expired = jwt::issue_access_token(
        TEST_SECRET,
        "user-1",
        "user-1@example.com",
        None,
        None,
        &[],
        -120,
    )
    .unwrap();

    let ws_url = format!("ws://{}/ws?token={}", addr, expired);
    let (stream, _) = tokio_tungstenite::connect_async(&ws_url).await.unwrap();
    let (_write, mut read) = stream.split();

    let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
        .await
        .expect("Expected close message within timeout");

    match msg {
        Some(Ok(Message::Close(Some(frame)))) => {
            assert_eq!(
                frame.code,
                tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode::from(4001),
                "Expected close code 4001 (token expired)"
            );
        }
        Some(Ok(Message::Close(None))) | None => {}
        other => panic!("Expected close, got: {:?}", other),
    }
}

#[tokio::test]
async fn fanout_preserves_order_and_never_echoes() {
    let (addr, _state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p1"])).await;
    let b = connect(addr, &token_for("user-b", &["p1"])).await;
    let c = connect(addr, &token_for("user-c", &["p1"])).await;
    let (mut a_write, mut a_read) = a.split();
    let (_b_write, mut b_read) = b.split();
    let (_c_write, mut c_read) = c.split();

    // Let all three actors finish registration and auto-join
    tokio::time::sleep(Duration::from_millis(200)).await;

    for seq in 1..=3 {
        a_write
            .send(event_text(serde_json::json!({
                "type": "task_update",
                "projectId": "p1",
                "taskId": "t1",
                "seq": seq,
                // Spoofed fields the bus must overwrite
                "updatedBy": "evil",
                "timestamp": "1970-01-01T00:00:00Z",
            })))
            .await
            .unwrap();
    }

    for read in [&mut b_read, &mut c_read] {
        for seq in 1..=3 {
            let event = next_event(read, Duration::from_secs(2))
                .await
                .expect("Expected task_updated event");
            assert_eq!(event["type"], "task_updated");
            assert_eq!(event["seq"], seq, "Events must arrive in publish order");
            assert_eq!(event["projectId"], "p1");
            assert_eq!(event["updatedBy"], "user-a", "Sender must be stamped server-side");
            assert_ne!(event["timestamp"], "1970-01-01T00:00:00Z");
        }
    }

    // The publisher never receives its own events
    assert!(
        next_event(&mut a_read, Duration::from_millis(300)).await.is_none(),
        "Publisher must not receive an echo"
    );
}

#[tokio::test]
async fn join_then_leave_yields_no_delivery() {
    let (addr, _state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p2"])).await;
    let b = connect(addr, &token_for("user-b", &[])).await;
    let (mut a_write, _a_read) = a.split();
    let (mut b_write, mut b_read) = b.split();

    tokio::time::sleep(Duration::from_millis(200)).await;

    b_write
        .send(event_text(serde_json::json!({
            "type": "join_project", "projectId": "p2"
        })))
        .await
        .unwrap();
    b_write
        .send(event_text(serde_json::json!({
            "type": "leave_project", "projectId": "p2"
        })))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    a_write
        .send(event_text(serde_json::json!({
            "type": "task_update", "projectId": "p2", "taskId": "t1"
        })))
        .await
        .unwrap();

    assert!(
        next_event(&mut b_read, Duration::from_millis(400)).await.is_none(),
        "A connection that left the room must receive nothing"
    );
}

#[tokio::test]
async fn typing_start_reaches_project_members() {
    let (addr, _state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p1"])).await;
    let b = connect(addr, &token_for("user-b", &["p1"])).await;
    let (mut a_write, _a_read) = a.split();
    let (_b_write, mut b_read) = b.split();

    tokio::time::sleep(Duration::from_millis(200)).await;

    a_write
        .send(event_text(serde_json::json!({
            "type": "typing_start", "projectId": "p1", "taskId": "t1"
        })))
        .await
        .unwrap();

    let event = next_event(&mut b_read, Duration::from_secs(2))
        .await
        .expect("Expected user_typing event");
    assert_eq!(event["type"], "user_typing");
    assert_eq!(event["userId"], "user-a");
    assert_eq!(event["taskId"], "t1");
    assert_eq!(event["isTyping"], true);

    a_write
        .send(event_text(serde_json::json!({
            "type": "typing_stop", "projectId": "p1", "taskId": "t1"
        })))
        .await
        .unwrap();

    let event = next_event(&mut b_read, Duration::from_secs(2))
        .await
        .expect("Expected user_typing event");
    assert_eq!(event["isTyping"], false);
}

#[tokio::test]
async fn duplicate_join_delivers_once() {
    let (addr, _state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p9"])).await;
    let b = connect(addr, &token_for("user-b", &[])).await;
    let (mut a_write, _a_read) = a.split();
    let (mut b_write, mut b_read) = b.split();

    tokio::time::sleep(Duration::from_millis(200)).await;

    for _ in 0..2 {
        b_write
            .send(event_text(serde_json::json!({
                "type": "join_project", "projectId": "p9"
            })))
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(200)).await;

    a_write
        .send(event_text(serde_json::json!({
            "type": "task_update", "projectId": "p9", "taskId": "t1"
        })))
        .await
        .unwrap();

    let event = next_event(&mut b_read, Duration::from_secs(2))
        .await
        .expect("Expected one task_updated event");
    assert_eq!(event["type"], "task_updated");

    assert!(
        next_event(&mut b_read, Duration::from_millis(300)).await.is_none(),
        "Double join must not cause duplicate delivery"
    );
}

#[tokio::test]
async fn malformed_event_is_dropped_without_broadcast() {
    let (addr, _state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p1"])).await;
    let b = connect(addr, &token_for("user-b", &["p1"])).await;
    let (mut a_write, _a_read) = a.split();
    let (_b_write, mut b_read) = b.split();

    tokio::time::sleep(Duration::from_millis(200)).await;

    // Missing the target topic
    a_write
        .send(event_text(serde_json::json!({
            "type": "task_update", "taskId": "t1"
        })))
        .await
        .unwrap();
    // Unknown event kind
    a_write
        .send(Message::Text("{\"type\":\"bogus\"}".to_string().into()))
        .await
        .unwrap();
    // Not even JSON
    a_write
        .send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();

    assert!(
        next_event(&mut b_read, Duration::from_millis(400)).await.is_none(),
        "Malformed events must not be broadcast"
    );
}

#[tokio::test]
async fn heartbeat_reports_connection_count() {
    let (addr, _state) = start_test_server(Some(Duration::from_millis(400))).await;

    let a = connect(addr, &token_for("user-a", &[])).await;
    let (_a_write, mut a_read) = a.split();

    let event = next_event(&mut a_read, Duration::from_secs(3))
        .await
        .expect("Expected system_heartbeat event");
    assert_eq!(event["type"], "system_heartbeat");
    assert_eq!(event["connectedUsers"], 1);
    assert!(event["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn auto_join_covers_org_and_project_rooms() {
    let (addr, state) = start_test_server(None).await;

    let a = connect(addr, &token_for("user-a", &["p1", "p2"])).await;
    let (_a_write, _a_read) = a.split();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(state.sessions.len(), 1);
    assert_eq!(state.rooms.members(&Topic::Org("org-1".to_string())).len(), 1);
    assert_eq!(state.rooms.members(&Topic::Project("p1".to_string())).len(), 1);
    assert_eq!(state.rooms.members(&Topic::Project("p2".to_string())).len(), 1);
}

#[tokio::test]
async fn disconnect_cleans_up_registry_and_rooms() {
    let (addr, state) = start_test_server(None).await;

    {
        let a = connect(addr, &token_for("user-a", &["p1"])).await;
        let (mut a_write, _a_read) = a.split();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(state.sessions.len(), 1);

        a_write.send(Message::Close(None)).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(state.sessions.len(), 0);
    assert!(state.rooms.members(&Topic::Project("p1".to_string())).is_empty());
    assert!(state.rooms.members(&Topic::Org("org-1".to_string())).is_empty());
}
