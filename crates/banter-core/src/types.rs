//! Domain values exchanged through the relay.

use std::hash::{Hash, Hasher};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A participant currently in the room.
///
/// Identity is the `id` field alone; equality and hashing ignore every other
/// field. The value is immutable once created — a rejoin replaces the entry
/// rather than mutating it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Client-supplied stable identifier.
    pub id: String,
    /// Display name shown in the roster.
    pub username: String,
    /// Whether the user joined without an account.
    pub is_anonymous: bool,
    /// When the user joined, RFC 3339.
    pub join_time: String,
}

impl User {
    /// Create a user joining now.
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        is_anonymous: bool,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_anonymous,
            join_time: now_rfc3339(),
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// A chat message as it is persisted and broadcast.
///
/// Flows through the relay; never held as registry state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Client-assigned message identifier.
    pub id: String,
    /// Username of the sender at the time of sending.
    pub sender_username: String,
    /// Message body.
    pub content: String,
    /// Client-supplied timestamp string.
    pub timestamp: String,
    /// Whether the sender was anonymous.
    pub is_anonymous: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_equality_is_by_id_only() {
        let a = User::new("u1", "alice", false);
        let b = User {
            username: "someone-else".into(),
            is_anonymous: true,
            ..a.clone()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_ids_are_not_equal() {
        let a = User::new("u1", "alice", false);
        let b = User::new("u2", "alice", false);
        assert_ne!(a, b);
    }

    #[test]
    fn user_hash_follows_id() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let _ = set.insert(User::new("u1", "alice", false));
        let _ = set.insert(User {
            username: "renamed".into(),
            ..User::new("u1", "alice", false)
        });
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn user_serializes_camel_case() {
        let user = User::new("u1", "alice", true);
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "u1");
        assert_eq!(json["username"], "alice");
        assert_eq!(json["isAnonymous"], true);
        assert!(json["joinTime"].is_string());
    }

    #[test]
    fn chat_message_serializes_camel_case() {
        let msg = ChatMessage {
            id: "m1".into(),
            sender_username: "alice".into(),
            content: "hi".into(),
            timestamp: "2026-08-04T10:00:00.000Z".into(),
            is_anonymous: false,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["senderUsername"], "alice");
        assert_eq!(json["isAnonymous"], false);
    }

    #[test]
    fn chat_message_roundtrip() {
        let msg = ChatMessage {
            id: "m1".into(),
            sender_username: "bob".into(),
            content: "hello".into(),
            timestamp: "2026-08-04T10:00:00.000Z".into(),
            is_anonymous: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn now_rfc3339_has_millis_and_utc_suffix() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }
}
