//! Inbound envelope dispatch.
//!
//! Stateless across frames: everything lives in the registry and the
//! presence directory. A bad frame never terminates the connection and a
//! store failure never cancels the corresponding broadcast.

use std::sync::Arc;

use banter_core::envelope::{JoinProfile, MessageDraft};
use banter_core::{ChatMessage, ChatStore, Inbound, Outbound, ProtocolError, User, decode};
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::presence::PresenceDirectory;
use super::registry::ConnectionRegistry;
use super::session;

/// Shared relay state threaded through every handler.
#[derive(Clone)]
pub struct RelayContext {
    /// Live connections and broadcast fan-out.
    pub registry: Arc<ConnectionRegistry>,
    /// The roster of joined users.
    pub presence: Arc<PresenceDirectory>,
    /// Persistence gateway.
    pub store: Arc<dyn ChatStore>,
    /// Recent messages replayed to a joining client.
    pub history_limit: usize,
}

/// Handle one inbound text frame from a connection.
pub async fn handle_frame(text: &str, conn: &Arc<Connection>, ctx: &RelayContext) {
    let envelope = match decode(text) {
        Ok(envelope) => envelope,
        Err(ProtocolError::UnknownType(kind)) => {
            warn!(conn_id = %conn.id, kind, "ignoring unknown envelope type");
            return;
        }
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "ignoring malformed frame");
            return;
        }
    };

    match envelope {
        Inbound::UserJoin { user } => on_join(conn, ctx, user).await,
        Inbound::Message { message } => on_message(conn, ctx, message).await,
        Inbound::UserLeave => session::leave(conn, ctx).await,
        Inbound::TypingStart => on_typing(conn, ctx, true).await,
        Inbound::TypingStop => on_typing(conn, ctx, false).await,
    }
}

/// Bind the user, update the roster, persist, broadcast the join, then send
/// history to the joiner alone.
async fn on_join(conn: &Arc<Connection>, ctx: &RelayContext, profile: JoinProfile) {
    let user = User::new(profile.id, profile.username, profile.is_anonymous);

    // A join on an already-bound connection is an overwrite: the previous
    // user silently drops out of the roster.
    if let Some(previous) = conn.bind(user.clone()) {
        let _ = ctx.presence.remove(&previous.id);
        debug!(
            conn_id = %conn.id,
            previous = %previous.username,
            "connection rebound to a new user"
        );
    }
    ctx.presence.add(user.clone());

    if let Err(e) = ctx
        .store
        .save_user(&user.id, &user.username, user.is_anonymous)
    {
        warn!(username = %user.username, error = %e, "failed to persist user");
    }

    info!(
        conn_id = %conn.id,
        username = %user.username,
        anonymous = user.is_anonymous,
        "user joined"
    );

    let roster = ctx.presence.snapshot();
    ctx.registry
        .broadcast(&Outbound::user_joined(user.username, roster))
        .await;

    send_history(conn, ctx);
}

/// Persist and echo a chat message to the whole room, sender included.
async fn on_message(conn: &Arc<Connection>, ctx: &RelayContext, draft: MessageDraft) {
    let Some(sender) = conn.user() else {
        warn!(conn_id = %conn.id, "dropping message from unjoined connection");
        return;
    };

    let message = ChatMessage {
        id: draft.id,
        sender_username: sender.username,
        content: draft.content,
        timestamp: draft.timestamp,
        is_anonymous: sender.is_anonymous,
    };

    if let Err(e) = ctx.store.save_message(
        &message.id,
        &message.sender_username,
        &message.content,
        message.is_anonymous,
    ) {
        warn!(message_id = %message.id, error = %e, "failed to persist message");
    }

    debug!(
        conn_id = %conn.id,
        message_id = %message.id,
        sender = %message.sender_username,
        "relaying message"
    );
    ctx.registry.broadcast(&Outbound::Message { message }).await;
}

/// Relay a typing signal to everyone except the typist. A no-op for
/// connections that never joined.
async fn on_typing(conn: &Arc<Connection>, ctx: &RelayContext, started: bool) {
    let Some(user) = conn.user() else {
        return;
    };
    let envelope = if started {
        Outbound::typing_start(user.username)
    } else {
        Outbound::typing_stop(user.username)
    };
    ctx.registry.broadcast_except(&envelope, &conn.id).await;
}

/// Send recent history to one connection. A store failure degrades to an
/// empty history rather than suppressing the envelope.
fn send_history(conn: &Arc<Connection>, ctx: &RelayContext) {
    let messages = match ctx.store.recent_messages(ctx.history_limit) {
        Ok(messages) => messages,
        Err(e) => {
            warn!(conn_id = %conn.id, error = %e, "failed to load message history");
            Vec::new()
        }
    };

    let envelope = Outbound::MessageHistory { messages };
    match serde_json::to_string(&envelope) {
        Ok(json) => {
            if !conn.send(Arc::new(json)) {
                warn!(conn_id = %conn.id, "failed to enqueue message history");
            }
        }
        Err(e) => warn!(conn_id = %conn.id, error = %e, "failed to serialize message history"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
