//! Outbound session lifecycle: connect/reconnect cycles, send, and either
//! blocking receive or a background listener loop.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    connection::{Connection, LineReader, LineWriter},
    error::NetError,
    listener::ClientListener,
};

/// Bound on connection establishment; reads block indefinitely.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

/// A client holding at most one live connection to a server.
///
/// Two modes, fixed by whether a listener is registered when `connect` runs:
///
/// - **Blocking mode** (no listener): the caller drives [`receive`] itself.
/// - **Listener mode**: a background task reads lines and pushes each one to
///   [`ClientListener::on_message`]; end of stream or an I/O error closes
///   the connection, fires `on_disconnected` exactly once, and ends the
///   loop. The loop never restarts itself; reconnecting is the caller's job.
///
/// [`send`] with no open connection fails with [`NetError::NotConnected`];
/// it never reconnects implicitly.
///
/// [`receive`]: Client::receive
/// [`send`]: Client::send
pub struct Client {
    target: SocketAddr,
    connect_timeout: Duration,
    listener: Option<Arc<dyn ClientListener>>,
    link: Option<Link>,
}

/// One live connection. `alive` flips off when the read loop (or a blocking
/// receive) observes a terminal event, so `is_connected` stays best-effort
/// honest without another I/O attempt.
struct Link {
    writer: LineWriter,
    local_addr: SocketAddr,
    alive: Arc<AtomicBool>,
    reader: ReaderSlot,
}

enum ReaderSlot {
    /// Blocking mode: `receive` reads directly.
    Direct(LineReader),
    /// Listener mode: a background task owns the reader.
    Background {
        task: JoinHandle<()>,
        hook_fired: Arc<AtomicBool>,
        listener: Arc<dyn ClientListener>,
    },
}

impl Client {
    /// Creates a client for `target` without connecting.
    pub fn new(target: SocketAddr) -> Self {
        Self {
            target,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            listener: None,
            link: None,
        }
    }

    /// Creates a client that will run in listener mode once connected.
    pub fn with_listener(target: SocketAddr, listener: Arc<dyn ClientListener>) -> Self {
        Self {
            target,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            listener: Some(listener),
            link: None,
        }
    }

    /// Installs or replaces the listener; takes effect on the next connect.
    pub fn set_listener(&mut self, listener: Arc<dyn ClientListener>) {
        self.listener = Some(listener);
    }

    pub fn set_connect_timeout(&mut self, limit: Duration) {
        self.connect_timeout = limit;
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Local address of the live connection, if any. This is the identity
    /// the server derives for this session.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|link| link.local_addr)
    }

    /// Connects to the target, closing any existing connection first
    /// (pending unread data is discarded). On failure the client stays
    /// disconnected and the error goes to the caller. On success in
    /// listener mode the background loop starts and `on_connected` fires.
    pub async fn connect(&mut self) -> Result<(), NetError> {
        self.close().await;

        let conn = Connection::open(self.target, self.connect_timeout).await?;
        let local_addr = conn.local_addr();
        let (reader, writer) = conn.into_split()?;
        let alive = Arc::new(AtomicBool::new(true));

        let reader = match &self.listener {
            Some(listener) => {
                let hook_fired = Arc::new(AtomicBool::new(false));
                // Fire before the loop starts so an immediate greeting from
                // the server cannot reach on_message first.
                listener.on_connected();
                let task = tokio::spawn(listen_loop(
                    reader,
                    Arc::clone(listener),
                    Arc::clone(&alive),
                    Arc::clone(&hook_fired),
                ));
                ReaderSlot::Background {
                    task,
                    hook_fired,
                    listener: Arc::clone(listener),
                }
            }
            None => ReaderSlot::Direct(reader),
        };

        info!(server = %self.target, local = %local_addr, "connected");
        self.link = Some(Link {
            writer,
            local_addr,
            alive,
            reader,
        });
        Ok(())
    }

    /// Retargets the client, then connects. Any existing connection to the
    /// old target is closed first.
    pub async fn connect_to(&mut self, target: SocketAddr) -> Result<(), NetError> {
        self.target = target;
        self.connect().await
    }

    /// Sends one line to the server. Fails with [`NetError::NotConnected`]
    /// when no connection is open and [`NetError::EmbeddedNewline`] when the
    /// message contains a line terminator.
    pub async fn send(&mut self, message: &str) -> Result<(), NetError> {
        match &mut self.link {
            Some(link) => link.writer.write_line(message).await,
            None => Err(NetError::NotConnected),
        }
    }

    /// Blocks until one line arrives (blocking mode only). On end of stream
    /// or I/O failure the connection is closed and the error propagates;
    /// the caller must reconnect before the next attempt.
    pub async fn receive(&mut self) -> Result<String, NetError> {
        let link = self.link.as_mut().ok_or(NetError::NotConnected)?;
        let reader = match &mut link.reader {
            ReaderSlot::Direct(reader) => reader,
            ReaderSlot::Background { .. } => return Err(NetError::ListenerMode),
        };

        let outcome = reader.read_line().await;
        match outcome {
            Ok(Some(line)) => Ok(line),
            Ok(None) => {
                self.close().await;
                Err(NetError::Disconnected)
            }
            Err(err) => {
                self.close().await;
                Err(err)
            }
        }
    }

    /// Best-effort: a half-broken connection may still report `true` until
    /// the next I/O attempt observes the failure.
    pub fn is_connected(&self) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.alive.load(Ordering::SeqCst))
    }

    /// Idempotent; safe to call with no open connection. In listener mode
    /// the background loop is stopped and `on_disconnected` fires if the
    /// loop had not already reported the disconnect itself.
    pub async fn close(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };
        link.alive.store(false, Ordering::SeqCst);
        link.writer.shutdown().await;

        if let ReaderSlot::Background {
            task,
            hook_fired,
            listener,
        } = link.reader
        {
            task.abort();
            if !hook_fired.swap(true, Ordering::SeqCst) {
                listener.on_disconnected();
            }
        }
        debug!(server = %self.target, "connection closed");
    }
}

/// Listener-mode read loop: one line per `on_message` call, terminated by
/// end of stream or an I/O error. `hook_fired` arbitrates the race with an
/// explicit `close` so `on_disconnected` runs exactly once.
async fn listen_loop(
    mut reader: LineReader,
    listener: Arc<dyn ClientListener>,
    alive: Arc<AtomicBool>,
    hook_fired: Arc<AtomicBool>,
) {
    loop {
        match reader.read_line().await {
            Ok(Some(line)) => listener.on_message(&line),
            Ok(None) => {
                debug!("server closed the connection");
                break;
            }
            Err(err) => {
                debug!(error = ?err, "client read failed");
                break;
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    if !hook_fired.swap(true, Ordering::SeqCst) {
        listener.on_disconnected();
    }
}
