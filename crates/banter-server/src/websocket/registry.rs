//! Connection registry and broadcast fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use banter_core::{Outbound, User};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::Connection;

/// Tracks every live connection and fans envelopes out to them.
///
/// Broadcast takes a snapshot of the current membership before delivering,
/// so a concurrent join or leave may legitimately miss the envelope but can
/// never tear the iteration. Delivery failures are isolated per recipient
/// and never remove a connection — removal belongs to the lifecycle path,
/// where it cannot race a concurrent close.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection.
    ///
    /// Registering an id twice is a logic error upstream; the registry logs
    /// it and keeps the existing entry.
    pub async fn register(&self, connection: Arc<Connection>) {
        let mut conns = self.connections.write().await;
        if conns.contains_key(&connection.id) {
            warn!(conn_id = %connection.id, "connection already registered, ignoring");
            return;
        }
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Remove a connection by ID. A no-op if it is not present.
    pub async fn unregister(&self, conn_id: &str) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(conn_id);
    }

    /// The user bound to a registered connection, if any.
    pub async fn user_of(&self, conn_id: &str) -> Option<User> {
        let conns = self.connections.read().await;
        conns.get(conn_id).and_then(|c| c.user())
    }

    /// Deliver an envelope to every registered connection.
    pub async fn broadcast(&self, envelope: &Outbound) {
        self.fan_out(envelope, None).await;
    }

    /// Deliver an envelope to every registered connection except one.
    pub async fn broadcast_except(&self, envelope: &Outbound, except: &str) {
        self.fan_out(envelope, Some(except)).await;
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    async fn fan_out(&self, envelope: &Outbound, except: Option<&str>) {
        let json = match serde_json::to_string(envelope) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound envelope");
                return;
            }
        };

        let targets = self.snapshot().await;
        debug!(recipients = targets.len(), "broadcasting envelope");
        for conn in targets {
            if except == Some(conn.id.as_str()) {
                continue;
            }
            if !conn.send(json.clone()) {
                warn!(conn_id = %conn.id, "failed to enqueue broadcast frame");
            }
        }
    }

    /// Snapshot the current membership, releasing the lock before delivery.
    async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
