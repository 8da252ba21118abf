//! Prefixed, time-ordered identifiers.
//!
//! Server-assigned IDs are UUID v7 so they sort by creation time.

use uuid::Uuid;

/// Generate a connection identifier (`conn_` + UUID v7).
pub fn connection_id() -> String {
    format!("conn_{}", Uuid::now_v7())
}
