use std::{io, net::SocketAddr};

use thiserror::Error;

/// Errors surfaced by clients, servers, and connections.
///
/// A graceful peer close is not an error: read paths report it as
/// `Ok(None)`. [`NetError::Disconnected`] appears only where a line was
/// required and the peer hung up instead (blocking [`receive`]).
///
/// [`receive`]: crate::Client::receive
#[derive(Debug, Error)]
pub enum NetError {
    /// The transport refused or failed the connection attempt.
    #[error("failed to connect to {addr}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The connection attempt did not complete within the configured timeout.
    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: SocketAddr },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Read or write failure on a live connection (reset, broken pipe).
    #[error("i/o failure on connection")]
    Io(#[from] io::Error),

    /// The peer closed the connection while a line was still expected.
    #[error("peer closed the connection")]
    Disconnected,

    /// Operation attempted on a connection that was already closed locally.
    #[error("connection is closed")]
    Closed,

    /// Operation requires an open connection and the client has none.
    #[error("client is not connected")]
    NotConnected,

    /// Outbound text contained a line terminator, which would corrupt framing.
    #[error("message contains an embedded line terminator")]
    EmbeddedNewline,

    /// Blocking receive attempted while a background listener loop owns the reader.
    #[error("a listener loop owns this connection's reader")]
    ListenerMode,
}
