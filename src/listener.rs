//! Application callback contracts.
//!
//! Hooks run on the connection's own read-loop task: client hooks on the
//! client's background task, server hooks on the session task that read the
//! line. A hook that blocks stalls further delivery on that one connection
//! and nothing else.

/// Callbacks for a [`Client`](crate::Client) running in listener mode.
pub trait ClientListener: Send + Sync {
    /// A line arrived from the server.
    fn on_message(&self, text: &str);

    /// The client established a connection.
    fn on_connected(&self) {}

    /// The connection ended, whether by peer close, I/O failure, or an
    /// explicit local close. Fires exactly once per connection.
    fn on_disconnected(&self) {}
}

/// Callbacks for a [`Server`](crate::Server).
///
/// `on_message` may run concurrently for different sessions; within one
/// session calls are strictly serial and in arrival order. Applications
/// needing cross-session serialization must lock inside the hook.
pub trait ServerListener: Send + Sync {
    /// A line arrived from the named session. Returning `Some` sends the
    /// reply back to that session before its next line is dispatched;
    /// `None` means no response.
    fn on_message(&self, session_id: &str, text: &str) -> Option<String>;

    /// A new session was accepted and registered.
    fn on_client_connected(&self, _session_id: &str) {}

    /// A session ended and was removed from the registry. Fires exactly
    /// once per session.
    fn on_client_disconnected(&self, _session_id: &str) {}
}
