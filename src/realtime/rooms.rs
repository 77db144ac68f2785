//! Room router: named broadcast groups keyed by `org:<id>` / `project:<id>`.
//!
//! Rooms are derived state — a room exists exactly as long as it has
//! members. Membership invariant: a connection appears in a room iff it
//! issued a matching join with no subsequent leave/disconnect.

use std::collections::HashSet;
use std::fmt;

use dashmap::DashMap;

use crate::auth::Principal;
use crate::realtime::ConnectionId;

/// A room topic. Organization and project rooms are disjoint namespaces;
/// a connection may belong to any number of rooms simultaneously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Org(String),
    Project(String),
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Org(id) => write!(f, "org:{}", id),
            Topic::Project(id) => write!(f, "project:{}", id),
        }
    }
}

#[derive(Default)]
pub struct RoomRouter {
    /// topic -> members
    rooms: DashMap<Topic, HashSet<ConnectionId>>,
    /// connection -> topics it belongs to, for O(1) disconnect cleanup
    memberships: DashMap<ConnectionId, HashSet<Topic>>,
}

impl RoomRouter {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Add a connection to a room. Idempotent: joining twice leaves
    /// exactly one membership.
    pub fn join(&self, conn: ConnectionId, topic: Topic) {
        self.rooms.entry(topic.clone()).or_default().insert(conn);
        self.memberships.entry(conn).or_default().insert(topic);
    }

    /// Remove a connection from a room. Idempotent; the room entry is
    /// dropped once its last member leaves.
    pub fn leave(&self, conn: ConnectionId, topic: &Topic) {
        let mut drop_room = false;
        if let Some(mut members) = self.rooms.get_mut(topic) {
            members.remove(&conn);
            drop_room = members.is_empty();
        }
        if drop_room {
            self.rooms.remove(topic);
        }

        let mut drop_conn = false;
        if let Some(mut topics) = self.memberships.get_mut(&conn) {
            topics.remove(topic);
            drop_conn = topics.is_empty();
        }
        if drop_conn {
            self.memberships.remove(&conn);
        }
    }

    /// Remove a connection from every room it belongs to (disconnect path).
    pub fn leave_all(&self, conn: ConnectionId) {
        let topics = self
            .memberships
            .remove(&conn)
            .map(|(_, topics)| topics)
            .unwrap_or_default();

        for topic in topics {
            let mut drop_room = false;
            if let Some(mut members) = self.rooms.get_mut(&topic) {
                members.remove(&conn);
                drop_room = members.is_empty();
            }
            if drop_room {
                self.rooms.remove(&topic);
            }
        }
    }

    /// Join a freshly authenticated connection to its organization room
    /// and to a room per project membership.
    pub fn auto_join(&self, conn: ConnectionId, principal: &Principal) {
        if let Some(org_id) = &principal.organization_id {
            self.join(conn, Topic::Org(org_id.clone()));
        }
        for project_id in &principal.project_ids {
            self.join(conn, Topic::Project(project_id.clone()));
        }
    }

    /// Current members of a room. Empty if the room does not exist.
    pub fn members(&self, topic: &Topic) -> Vec<ConnectionId> {
        self.rooms
            .get(topic)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }
}
