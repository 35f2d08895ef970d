//! Minimal line-oriented TCP toolkit: one client, one server, and the
//! connection plumbing they share. Messages are newline-delimited UTF-8
//! text; there is no length prefix, escaping, handshake, or encryption.
//! Each module focuses on a concrete responsibility:
//!
//! - [`connection`] wraps one socket with line-level read/write and a
//!   split form for concurrent use.
//! - [`client`] maintains a single outbound connection across
//!   send/receive/reconnect cycles, optionally pushing inbound lines to a
//!   registered listener from a background task.
//! - [`server`] accepts connections, tracks live sessions in a shared
//!   registry keyed by `"<ip>:<port>"`, and dispatches inbound lines to an
//!   application listener with targeted, broadcast, and request/response
//!   replies.
//! - [`listener`] defines the application callback contracts.
//! - [`error`] is the error taxonomy shared by all of the above.
//!
//! One spawned task per live connection performs blocking reads; a failed
//! session tears itself down without affecting other sessions or the
//! listening socket.

pub mod client;
pub mod connection;
pub mod error;
pub mod listener;
pub mod server;
mod session;

pub use client::{Client, DEFAULT_CONNECT_TIMEOUT};
pub use connection::{Connection, LineReader, LineWriter};
pub use error::NetError;
pub use listener::{ClientListener, ServerListener};
pub use server::Server;
