//! The roster of currently-joined users.

use banter_core::User;
use parking_lot::RwLock;

/// Ordered set of joined users, keyed by user id.
///
/// Kept consistent with the registry's bindings by the dispatcher and the
/// leave path: every mutation happens before the triggering broadcast takes
/// its roster snapshot, so clients never see a stale roster.
pub struct PresenceDirectory {
    users: RwLock<Vec<User>>,
}

impl PresenceDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
        }
    }

    /// Add a user, replacing any existing entry with the same id.
    pub fn add(&self, user: User) {
        let mut users = self.users.write();
        users.retain(|u| u.id != user.id);
        users.push(user);
    }

    /// Remove a user by id. Returns whether an entry was removed.
    pub fn remove(&self, user_id: &str) -> bool {
        let mut users = self.users.write();
        let before = users.len();
        users.retain(|u| u.id != user_id);
        users.len() < before
    }

    /// The current roster in join order.
    pub fn snapshot(&self) -> Vec<User> {
        self.users.read().clone()
    }

    /// Whether a user id is present.
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.read().iter().any(|u| u.id == user_id)
    }

    /// Number of joined users.
    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    /// Whether the room is empty.
    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

impl Default for PresenceDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_snapshot_in_join_order() {
        let presence = PresenceDirectory::new();
        presence.add(User::new("u1", "alice", false));
        presence.add(User::new("u2", "bob", false));

        let roster = presence.snapshot();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].username, "alice");
        assert_eq!(roster[1].username, "bob");
    }

    #[test]
    fn add_same_id_replaces() {
        let presence = PresenceDirectory::new();
        presence.add(User::new("u1", "alice", false));
        presence.add(User::new("u1", "alice-renamed", true));

        assert_eq!(presence.len(), 1);
        assert_eq!(presence.snapshot()[0].username, "alice-renamed");
    }

    #[test]
    fn remove_by_id() {
        let presence = PresenceDirectory::new();
        presence.add(User::new("u1", "alice", false));
        assert!(presence.remove("u1"));
        assert!(presence.is_empty());
    }

    #[test]
    fn remove_missing_is_false() {
        let presence = PresenceDirectory::new();
        assert!(!presence.remove("ghost"));
    }

    #[test]
    fn remove_is_idempotent() {
        let presence = PresenceDirectory::new();
        presence.add(User::new("u1", "alice", false));
        assert!(presence.remove("u1"));
        assert!(!presence.remove("u1"));
    }

    #[test]
    fn contains_tracks_membership() {
        let presence = PresenceDirectory::new();
        assert!(!presence.contains("u1"));
        presence.add(User::new("u1", "alice", false));
        assert!(presence.contains("u1"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let presence = PresenceDirectory::new();
        presence.add(User::new("u1", "alice", false));
        let roster = presence.snapshot();
        presence.add(User::new("u2", "bob", false));
        // Earlier snapshot is unaffected by later mutations.
        assert_eq!(roster.len(), 1);
    }
}
