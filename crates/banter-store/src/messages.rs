//! Message repository — stateless, every method takes `&Connection`.

use banter_core::ChatMessage;
use banter_core::types::now_rfc3339;
use rusqlite::{Connection, params};

use crate::errors::Result;

/// Message repository.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a message, stamped with the store's arrival time.
    pub fn insert(
        conn: &Connection,
        id: &str,
        username: &str,
        content: &str,
        is_anonymous: bool,
    ) -> Result<()> {
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO messages (id, username, content, timestamp, is_anonymous, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?4)",
            params![id, username, content, now, is_anonymous],
        )?;
        Ok(())
    }

    /// The most recent `limit` messages in chronological (oldest-first) order.
    ///
    /// `rowid` breaks ties between messages stamped in the same millisecond,
    /// keeping replay order stable.
    pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<ChatMessage>> {
        let mut stmt = conn.prepare(
            "SELECT id, username, content, timestamp, is_anonymous
             FROM messages
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?1",
        )?;
        let mut rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ChatMessage {
                    id: row.get("id")?,
                    sender_username: row.get("username")?,
                    content: row.get("content")?,
                    timestamp: row.get("timestamp")?,
                    is_anonymous: row.get("is_anonymous")?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// Delete messages older than `days`. Returns the number deleted.
    pub fn prune_older_than(conn: &Connection, days: i64) -> Result<usize> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(days))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let deleted = conn.execute(
            "DELETE FROM messages WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    /// Total stored message count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
