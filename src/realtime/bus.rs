//! Realtime event bus: the single validated dispatch point for client
//! events. Sender identity and timestamps on outbound events are always
//! taken from the registered principal and the server clock, never from
//! client input.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::realtime::event::{ClientEvent, ServerEvent};
use crate::realtime::rooms::{RoomRouter, Topic};
use crate::realtime::session::SessionRegistry;
use crate::realtime::ConnectionId;

/// Fields the bus stamps itself; client-supplied values are dropped.
const RESERVED_FIELDS: &[&str] = &["updatedBy", "authorId", "timestamp"];

#[derive(Debug, Error)]
pub enum PublishError {
    /// The source connection is not (or no longer) registered.
    #[error("connection is not registered")]
    UnknownConnection,
}

pub struct EventBus {
    sessions: Arc<SessionRegistry>,
    rooms: Arc<RoomRouter>,
}

impl EventBus {
    pub fn new(sessions: Arc<SessionRegistry>, rooms: Arc<RoomRouter>) -> Self {
        Self { sessions, rooms }
    }

    /// Dispatch one client event. Join/leave mutate room membership;
    /// the remaining kinds are stamped with the sender's verified
    /// identity and the current server time, then delivered to every
    /// other member of the target project room (no echo).
    pub fn publish(&self, source: ConnectionId, event: ClientEvent) -> Result<(), PublishError> {
        let principal = self
            .sessions
            .principal(source)
            .ok_or(PublishError::UnknownConnection)?;
        let user_id = principal.user_id;

        match event {
            ClientEvent::JoinProject { project_id } => {
                self.rooms.join(source, Topic::Project(project_id.clone()));
                tracing::info!(user_id = %user_id, project_id = %project_id, "Joined project room");
            }
            ClientEvent::LeaveProject { project_id } => {
                self.rooms.leave(source, &Topic::Project(project_id.clone()));
                tracing::info!(user_id = %user_id, project_id = %project_id, "Left project room");
            }
            ClientEvent::TaskUpdate { project_id, data } => {
                let event = ServerEvent::TaskUpdated {
                    data: stamped_payload(data, &project_id),
                    updated_by: user_id,
                    timestamp: Utc::now().to_rfc3339(),
                };
                self.broadcast(&Topic::Project(project_id), source, &event);
            }
            ClientEvent::CommentAdded { project_id, data } => {
                let event = ServerEvent::CommentAdded {
                    data: stamped_payload(data, &project_id),
                    author_id: user_id,
                    timestamp: Utc::now().to_rfc3339(),
                };
                self.broadcast(&Topic::Project(project_id), source, &event);
            }
            ClientEvent::TypingStart {
                project_id,
                task_id,
            } => {
                let event = ServerEvent::UserTyping {
                    user_id,
                    task_id,
                    is_typing: true,
                };
                self.broadcast(&Topic::Project(project_id), source, &event);
            }
            ClientEvent::TypingStop {
                project_id,
                task_id,
            } => {
                let event = ServerEvent::UserTyping {
                    user_id,
                    task_id,
                    is_typing: false,
                };
                self.broadcast(&Topic::Project(project_id), source, &event);
            }
        }

        Ok(())
    }

    /// Deliver an event to every room member except the source.
    /// An empty or missing room is a no-op.
    fn broadcast(&self, topic: &Topic, source: ConnectionId, event: &ServerEvent) {
        let msg = event.to_message();
        for member in self.rooms.members(topic) {
            if member == source {
                continue;
            }
            if let Some(sender) = self.sessions.sender(member) {
                let _ = sender.send(msg.clone());
            }
        }
    }
}

/// Drop reserved fields the client may have spoofed and re-attach the
/// target project id so receivers see the full payload.
fn stamped_payload(mut data: Map<String, Value>, project_id: &str) -> Map<String, Value> {
    for field in RESERVED_FIELDS {
        data.remove(*field);
    }
    data.insert(
        "projectId".to_string(),
        Value::String(project_id.to_string()),
    );
    data
}
