//! Tagged wire envelopes and the validating decoder.
//!
//! Every frame is a JSON object with a mandatory `type` discriminant.
//! [`decode`] distinguishes a malformed frame from a well-formed frame whose
//! type is simply unknown, so callers can log the two cases differently —
//! neither is fatal to the connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ChatMessage, User, now_rfc3339};

/// Envelope types accepted from clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Announce presence and bind a user to the connection.
    UserJoin {
        /// Profile of the joining user.
        user: JoinProfile,
    },
    /// Publish a chat message to the room.
    Message {
        /// Client-authored message body.
        message: MessageDraft,
    },
    /// Explicitly leave the room.
    UserLeave,
    /// Sender started typing.
    TypingStart,
    /// Sender stopped typing.
    TypingStop,
}

/// Profile supplied by the client in a `user_join` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinProfile {
    /// Stable user identifier.
    pub id: String,
    /// Display name.
    pub username: String,
    /// Whether the user has no account.
    pub is_anonymous: bool,
}

/// Client-authored message body in a `message` envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    /// Client-assigned message identifier.
    pub id: String,
    /// Message body.
    pub content: String,
    /// Client-supplied timestamp string.
    pub timestamp: String,
}

/// Envelope types pushed to clients.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// A user joined; carries the post-join roster.
    UserJoined {
        /// Username of the joiner.
        username: String,
        /// Full roster after the join.
        users: Vec<User>,
        /// RFC 3339 timestamp.
        timestamp: String,
    },
    /// A user left; carries the post-leave roster.
    UserLeft {
        /// Username of the leaver.
        username: String,
        /// Full roster after the leave.
        users: Vec<User>,
        /// RFC 3339 timestamp.
        timestamp: String,
    },
    /// A chat message echoed to the room.
    Message {
        /// The message as persisted.
        message: ChatMessage,
    },
    /// Someone started typing.
    TypingStart {
        /// Username of the typist.
        username: String,
        /// RFC 3339 timestamp.
        timestamp: String,
    },
    /// Someone stopped typing.
    TypingStop {
        /// Username of the typist.
        username: String,
        /// RFC 3339 timestamp.
        timestamp: String,
    },
    /// Recent history, sent once to a joining connection.
    MessageHistory {
        /// Messages oldest first.
        messages: Vec<ChatMessage>,
    },
}

impl Outbound {
    /// Build a `user_joined` envelope stamped with the current time.
    pub fn user_joined(username: impl Into<String>, users: Vec<User>) -> Self {
        Self::UserJoined {
            username: username.into(),
            users,
            timestamp: now_rfc3339(),
        }
    }

    /// Build a `user_left` envelope stamped with the current time.
    pub fn user_left(username: impl Into<String>, users: Vec<User>) -> Self {
        Self::UserLeft {
            username: username.into(),
            users,
            timestamp: now_rfc3339(),
        }
    }

    /// Build a `typing_start` envelope stamped with the current time.
    pub fn typing_start(username: impl Into<String>) -> Self {
        Self::TypingStart {
            username: username.into(),
            timestamp: now_rfc3339(),
        }
    }

    /// Build a `typing_stop` envelope stamped with the current time.
    pub fn typing_stop(username: impl Into<String>) -> Self {
        Self::TypingStop {
            username: username.into(),
            timestamp: now_rfc3339(),
        }
    }
}

/// Why an inbound frame was rejected at the parse boundary.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not valid JSON, or valid JSON that does not match the declared shape.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    /// A JSON object with no string `type` discriminant.
    #[error("envelope has no type field")]
    MissingType,
    /// Well-formed envelope with an unrecognised discriminant.
    #[error("unknown envelope type: {0}")]
    UnknownType(String),
}

/// Discriminants this relay accepts from clients.
const INBOUND_TYPES: &[&str] = &[
    "user_join",
    "message",
    "user_leave",
    "typing_start",
    "typing_stop",
];

/// Decode one inbound frame.
///
/// Unknown-but-well-formed discriminants yield [`ProtocolError::UnknownType`]
/// so the caller can log the offending type; everything else that fails is
/// [`ProtocolError::Malformed`].
pub fn decode(text: &str) -> Result<Inbound, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .ok_or(ProtocolError::MissingType)?;
    if !INBOUND_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }
    Ok(serde_json::from_value(value)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
