//! A single client connection and its user binding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use banter_core::User;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A connected client.
///
/// Owns the send half of the outbound queue; the socket write task drains the
/// other half. A connection starts unbound — it only gains a [`User`] when a
/// join envelope is processed.
pub struct Connection {
    /// Unique connection ID (`conn_…`).
    pub id: String,
    /// Bound user, if the connection has joined.
    user: Mutex<Option<User>>,
    /// Send channel to the connection's socket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the peer has responded since the last heartbeat check.
    is_alive: AtomicBool,
    /// When the last pong (or any liveness signal) arrived.
    last_pong: Mutex<Instant>,
    /// Frames dropped because the outbound queue was full or closed.
    dropped: AtomicU64,
}

impl Connection {
    /// Create a new, unbound connection.
    pub fn new(id: String, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            user: Mutex::new(None),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped: AtomicU64::new(0),
        }
    }

    /// Bind a user to this connection, returning any previous binding.
    pub fn bind(&self, user: User) -> Option<User> {
        self.user.lock().replace(user)
    }

    /// The currently bound user, if any.
    pub fn user(&self) -> Option<User> {
        self.user.lock().clone()
    }

    /// Atomically remove and return the bound user.
    ///
    /// The leave path relies on this: only one caller ever observes the user,
    /// so a double leave broadcasts at most one `user_left`.
    pub fn take_user(&self) -> Option<User> {
        self.user.lock().take()
    }

    /// Enqueue a frame for delivery.
    ///
    /// Returns `false` when the queue is full or closed; the frame is dropped
    /// and counted, never blocking the caller on a slow peer.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Record a liveness signal from the peer.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if the peer signalled liveness since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the peer last signalled liveness.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection() -> (Connection, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(8);
        (Connection::new("conn_1".into(), tx), rx)
    }

    #[test]
    fn new_connection_is_unbound() {
        let (conn, _rx) = make_connection();
        assert_eq!(conn.id, "conn_1");
        assert!(conn.user().is_none());
    }

    #[tokio::test]
    async fn send_delivers_to_queue() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.as_str(), "hello");
    }

    #[tokio::test]
    async fn send_to_closed_queue_counts_drop() {
        let (tx, rx) = mpsc::channel(8);
        let conn = Connection::new("conn_2".into(), tx);
        drop(rx);
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_queue_counts_drop() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = Connection::new("conn_3".into(), tx);
        assert!(conn.send(Arc::new("first".into())));
        assert!(!conn.send(Arc::new("second".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn bind_returns_previous_user() {
        let (conn, _rx) = make_connection();
        assert!(conn.bind(User::new("u1", "alice", false)).is_none());
        let previous = conn.bind(User::new("u2", "bob", false)).unwrap();
        assert_eq!(previous.id, "u1");
        assert_eq!(conn.user().unwrap().id, "u2");
    }

    #[test]
    fn take_user_is_one_shot() {
        let (conn, _rx) = make_connection();
        let _ = conn.bind(User::new("u1", "alice", false));
        assert!(conn.take_user().is_some());
        assert!(conn.take_user().is_none());
        assert!(conn.user().is_none());
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection();
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
    }

    #[test]
    fn last_pong_elapsed_resets_on_mark_alive() {
        let (conn, _rx) = make_connection();
        std::thread::sleep(Duration::from_millis(10));
        let before = conn.last_pong_elapsed();
        conn.mark_alive();
        assert!(conn.last_pong_elapsed() < before);
    }
}
