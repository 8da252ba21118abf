//! WebSocket session lifecycle — one connected client from upgrade through
//! the idempotent leave.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;

use super::connection::Connection;
use super::dispatcher::{RelayContext, handle_frame};

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE: usize = 1024;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection (unbound — joining is a protocol event)
/// 2. Spawns the outbound forwarder, which also sends periodic Ping frames
///    and gives up on a peer that stays silent past the pong timeout
/// 3. Dispatches inbound frames in arrival order
/// 4. Runs the leave procedure on every exit path: close frame, transport
///    error, silent peer, or server shutdown
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: String,
    ctx: RelayContext,
    config: &ServerConfig,
    cancel: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(OUTBOUND_QUEUE);
    let connection = Arc::new(Connection::new(conn_id.clone(), send_tx));

    info!(conn_id, "client connected");
    ctx.registry.register(connection.clone()).await;

    let ping_interval = Duration::from_secs(config.heartbeat_interval_secs);
    let pong_timeout = Duration::from_secs(config.heartbeat_timeout_secs);

    // Outbound forwarder: drains the queue and keeps the peer honest with
    // Ping frames. Exits when the socket or the queue closes.
    let outbound_conn = connection.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            let text = (*frame).clone();
                            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(
                            conn_id = %outbound_conn.id,
                            "peer unresponsive for {pong_timeout:?}, disconnecting"
                        );
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Inbound loop: frames from one connection are processed in arrival
    // order; concurrency exists only across connections.
    loop {
        let incoming = tokio::select! {
            incoming = ws_rx.next() => incoming,
            () = cancel.cancelled() => {
                info!(conn_id, "server shutting down, closing session");
                break;
            }
        };

        let Some(Ok(message)) = incoming else {
            break;
        };

        let text = match message {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => match std::str::from_utf8(data) {
                Ok(s) => Some(s.to_owned()),
                Err(_) => {
                    debug!(conn_id, len = data.len(), "ignoring non-UTF8 binary frame");
                    None
                }
            },
            Message::Close(_) => {
                info!(conn_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        if let Some(text) = text {
            handle_frame(&text, &connection, &ctx).await;
        }
    }

    info!(conn_id, dropped = connection.drop_count(), "client disconnected");
    leave(&connection, &ctx).await;
    outbound.abort();
}

/// The leave procedure. Idempotent and safe on a never-joined connection.
///
/// If a user is bound it is atomically taken, removed from the roster, and a
/// `user_left` with the post-removal roster is broadcast; the connection is
/// unregistered unconditionally. A second invocation finds no user and only
/// repeats the (idempotent) unregister.
pub async fn leave(conn: &Arc<Connection>, ctx: &RelayContext) {
    if let Some(user) = conn.take_user() {
        let _ = ctx.presence.remove(&user.id);
        info!(conn_id = %conn.id, username = %user.username, "user left");
        let roster = ctx.presence.snapshot();
        ctx.registry
            .broadcast(&banter_core::Outbound::user_left(user.username, roster))
            .await;
    }
    ctx.registry.unregister(&conn.id).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    // Driving `run_ws_session` needs a live WebSocket; the end-to-end relay
    // behaviour is covered through the dispatcher and `leave` in
    // tests/relay.rs. Unit tests here pin the leave procedure itself.

    use std::sync::Arc;

    use banter_core::User;
    use tokio::sync::mpsc;

    use super::super::connection::Connection;
    use super::super::dispatcher::RelayContext;
    use super::super::presence::PresenceDirectory;
    use super::super::registry::ConnectionRegistry;
    use super::leave;
    use banter_store::SqliteChatStore;

    fn make_ctx() -> RelayContext {
        RelayContext {
            registry: Arc::new(ConnectionRegistry::new()),
            presence: Arc::new(PresenceDirectory::new()),
            store: Arc::new(SqliteChatStore::in_memory().unwrap()),
            history_limit: 50,
        }
    }

    async fn joined_connection(
        ctx: &RelayContext,
        conn_id: &str,
        user_id: &str,
        username: &str,
    ) -> (Arc<Connection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(32);
        let conn = Arc::new(Connection::new(conn_id.into(), tx));
        ctx.registry.register(conn.clone()).await;
        let user = User::new(user_id, username, false);
        let _ = conn.bind(user.clone());
        ctx.presence.add(user);
        (conn, rx)
    }

    fn frames(rx: &mut mpsc::Receiver<Arc<String>>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(serde_json::from_str(&frame).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn leave_broadcasts_once_and_unregisters() {
        let ctx = make_ctx();
        let (alice, mut rx_alice) = joined_connection(&ctx, "c1", "u1", "alice").await;
        let (_bob, mut rx_bob) = joined_connection(&ctx, "c2", "u2", "bob").await;

        leave(&alice, &ctx).await;

        assert_eq!(ctx.registry.connection_count().await, 1);
        assert!(!ctx.presence.contains("u1"));

        let bob_frames = frames(&mut rx_bob);
        assert_eq!(bob_frames.len(), 1);
        assert_eq!(bob_frames[0]["type"], "user_left");
        assert_eq!(bob_frames[0]["username"], "alice");
        assert_eq!(bob_frames[0]["users"].as_array().unwrap().len(), 1);
        // The broadcast goes out before the unregister, so the leaver's own
        // connection still gets a delivery attempt.
        assert_eq!(frames(&mut rx_alice).len(), 1);
    }

    #[tokio::test]
    async fn leave_twice_broadcasts_exactly_once() {
        let ctx = make_ctx();
        let (alice, _rx_alice) = joined_connection(&ctx, "c1", "u1", "alice").await;
        let (_bob, mut rx_bob) = joined_connection(&ctx, "c2", "u2", "bob").await;

        leave(&alice, &ctx).await;
        leave(&alice, &ctx).await;

        let bob_frames = frames(&mut rx_bob);
        assert_eq!(
            bob_frames.iter().filter(|f| f["type"] == "user_left").count(),
            1
        );
        assert_eq!(ctx.registry.connection_count().await, 1);
    }

    #[tokio::test]
    async fn leave_without_join_broadcasts_nothing() {
        let ctx = make_ctx();
        let (tx, _rx) = mpsc::channel(32);
        let unjoined = Arc::new(Connection::new("c1".into(), tx));
        ctx.registry.register(unjoined.clone()).await;
        let (_bob, mut rx_bob) = joined_connection(&ctx, "c2", "u2", "bob").await;

        leave(&unjoined, &ctx).await;

        assert!(frames(&mut rx_bob).is_empty());
        assert_eq!(ctx.registry.connection_count().await, 1);
    }
}
