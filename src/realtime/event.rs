//! Wire-level realtime events. Text frames carry one JSON object tagged
//! by `type`; field names are camelCase to match the web clients.
//!
//! Client payloads are treated as untrusted: any sender identity or
//! timestamp they carry is stripped and re-stamped by the event bus.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Events a client may send after handshake authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinProject {
        project_id: String,
    },
    LeaveProject {
        project_id: String,
    },
    TaskUpdate {
        project_id: String,
        #[serde(flatten)]
        data: Map<String, Value>,
    },
    CommentAdded {
        project_id: String,
        #[serde(flatten)]
        data: Map<String, Value>,
    },
    TypingStart {
        project_id: String,
        task_id: String,
    },
    TypingStop {
        project_id: String,
        task_id: String,
    },
}

/// Events the server emits to clients. Sender identity and timestamp are
/// always set server-side.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    TaskUpdated {
        #[serde(flatten)]
        data: Map<String, Value>,
        updated_by: String,
        timestamp: String,
    },
    CommentAdded {
        #[serde(flatten)]
        data: Map<String, Value>,
        author_id: String,
        timestamp: String,
    },
    UserTyping {
        user_id: String,
        task_id: String,
        is_typing: bool,
    },
    SystemHeartbeat {
        timestamp: String,
        connected_users: usize,
    },
}

impl ServerEvent {
    /// Serialize into a WebSocket text frame.
    pub fn to_message(&self) -> Message {
        // ServerEvent serialization cannot fail: all fields are plain data.
        let text = serde_json::to_string(self).unwrap_or_default();
        Message::Text(text.into())
    }
}
