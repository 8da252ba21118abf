//! User repository — stateless, every method takes `&Connection`.

use rusqlite::{Connection, params};

use banter_core::types::now_rfc3339;

use crate::errors::Result;

/// A user row as stored.
#[derive(Clone, Debug)]
pub struct UserRow {
    /// Stable user identifier.
    pub id: String,
    /// Unique display name.
    pub username: String,
    /// Whether the user has no account.
    pub is_anonymous: bool,
    /// First time this username was seen, RFC 3339.
    pub created_at: String,
    /// Last join or activity refresh, RFC 3339.
    pub last_active: String,
}

/// User repository.
pub struct UserRepo;

impl UserRepo {
    /// Upsert a user. A conflicting username keeps its original row and
    /// refreshes `last_active`.
    pub fn upsert(conn: &Connection, id: &str, username: &str, is_anonymous: bool) -> Result<()> {
        let now = now_rfc3339();
        let _ = conn.execute(
            "INSERT INTO users (id, username, is_anonymous, created_at, last_active)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (username)
             DO UPDATE SET last_active = excluded.last_active",
            params![id, username, is_anonymous, now],
        )?;
        Ok(())
    }

    /// Refresh a user's `last_active` timestamp. Returns `false` when the
    /// username is unknown.
    pub fn touch(conn: &Connection, username: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE users SET last_active = ?1 WHERE username = ?2",
            params![now_rfc3339(), username],
        )?;
        Ok(changed > 0)
    }

    /// Users active within the last `minutes`, most recent first.
    pub fn active_since(conn: &Connection, minutes: i64) -> Result<Vec<UserRow>> {
        let threshold = (chrono::Utc::now() - chrono::Duration::minutes(minutes))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let mut stmt = conn.prepare(
            "SELECT id, username, is_anonymous, created_at, last_active
             FROM users
             WHERE last_active > ?1
             ORDER BY last_active DESC",
        )?;
        let rows = stmt
            .query_map(params![threshold], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Look up a user row by username.
    pub fn get_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
        use rusqlite::OptionalExtension;
        let row = conn
            .query_row(
                "SELECT id, username, is_anonymous, created_at, last_active
                 FROM users WHERE username = ?1",
                params![username],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
        Ok(UserRow {
            id: row.get("id")?,
            username: row.get("username")?,
            is_anonymous: row.get("is_anonymous")?,
            created_at: row.get("created_at")?,
            last_active: row.get("last_active")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
