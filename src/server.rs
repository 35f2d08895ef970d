//! Accept loop, session registry, and message dispatch.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use tokio::{
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::AbortHandle,
};
use tracing::{debug, info, warn};

use crate::{
    connection::Connection,
    error::NetError,
    listener::ServerListener,
    session::{run_session, SessionHandle},
};

/// A listening server dispatching inbound lines to a [`ServerListener`].
///
/// Cloning yields another handle to the same server, so an application can
/// stash a clone inside its listener and, for example, spawn [`close`] from
/// within a dispatch hook.
///
/// Each accepted connection becomes a session named `"<ip>:<port>"` after
/// its peer. Sessions live in a registry guarded by one mutex; the accept
/// loop inserts, and exactly one of the session's own failure path or an
/// external [`disconnect`]/[`close`] removes.
///
/// [`close`]: Server::close
/// [`disconnect`]: Server::disconnect
#[derive(Clone)]
pub struct Server {
    local_addr: SocketAddr,
    shared: Arc<ServerShared>,
    accept_task: AbortHandle,
}

pub(crate) struct ServerShared {
    sessions: Mutex<HashMap<String, SessionHandle>>,
    pub(crate) listener: Arc<dyn ServerListener>,
}

impl Server {
    /// Binds `addr` and starts accepting connections.
    pub async fn open(addr: SocketAddr, listener: Arc<dyn ServerListener>) -> Result<Self, NetError> {
        let socket = TcpListener::bind(addr)
            .await
            .map_err(|source| NetError::Bind { addr, source })?;
        let local_addr = socket.local_addr()?;

        let shared = Arc::new(ServerShared {
            sessions: Mutex::new(HashMap::new()),
            listener,
        });
        let accept_task = tokio::spawn(run_accept_loop(socket, Arc::clone(&shared)));

        info!(addr = %local_addr, "server listening");
        Ok(Self {
            local_addr,
            shared,
            accept_task: accept_task.abort_handle(),
        })
    }

    /// The bound address; useful when listening on an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends one line to the named session. `Ok(false)` when the identity is
    /// unknown (already disconnected, or never existed). A write failure
    /// surfaces as an error but does not remove the session; removal belongs
    /// to the session's own failure path or an explicit disconnect.
    pub async fn send_to(&self, session_id: &str, message: &str) -> Result<bool, NetError> {
        let writer = {
            let sessions = self.shared.sessions.lock().await;
            match sessions.get(session_id) {
                Some(handle) => handle.writer(),
                None => return Ok(false),
            }
        };
        writer.lock().await.write_line(message).await?;
        Ok(true)
    }

    /// Sends one line to every live session. Per-session write failures are
    /// logged and skipped; one slow or broken peer never affects the rest.
    pub async fn broadcast(&self, message: &str) -> Result<(), NetError> {
        if message.contains(['\n', '\r']) {
            return Err(NetError::EmbeddedNewline);
        }

        let targets: Vec<_> = {
            let sessions = self.shared.sessions.lock().await;
            sessions
                .iter()
                .map(|(id, handle)| (id.clone(), handle.writer()))
                .collect()
        };

        for (id, writer) in targets {
            if let Err(err) = writer.lock().await.write_line(message).await {
                debug!(session = %id, error = ?err, "broadcast delivery failed");
            }
        }
        Ok(())
    }

    /// Removes the session from the registry and closes its connection.
    /// Returns `false` if the identity was not present. Idempotent, also
    /// under a race with the session's own read-loop failure path.
    pub async fn disconnect(&self, session_id: &str) -> bool {
        self.shared.remove_session(session_id).await
    }

    /// True while the accept loop is still running.
    pub fn is_open(&self) -> bool {
        !self.accept_task.is_finished()
    }

    /// Snapshot of the identities of all live sessions.
    pub async fn session_ids(&self) -> Vec<String> {
        self.shared.sessions.lock().await.keys().cloned().collect()
    }

    /// Stops accepting, then disconnects every session. Idempotent.
    pub async fn close(&self) {
        self.accept_task.abort();
        self.shared.drain().await;
        info!(addr = %self.local_addr, "server closed");
    }
}

impl ServerShared {
    /// The single removal path for a session: take it out of the registry,
    /// close it, then fire the disconnect hook. Whoever removes the entry
    /// owns the rest; everyone else sees `false`.
    pub(crate) async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(id);
        let Some(handle) = removed else {
            return false;
        };
        handle.close();
        info!(session = %id, "client disconnected");
        self.listener.on_client_disconnected(id);
        true
    }

    async fn drain(&self) {
        let drained: Vec<_> = self.sessions.lock().await.drain().collect();
        for (id, handle) in drained {
            handle.close();
            info!(session = %id, "client disconnected");
            self.listener.on_client_disconnected(&id);
        }
    }
}

async fn run_accept_loop(socket: TcpListener, shared: Arc<ServerShared>) {
    loop {
        match socket.accept().await {
            Ok((stream, peer)) => admit(&shared, stream, peer).await,
            Err(err) => {
                // A failed accept means the listening socket is gone; tear down.
                warn!(error = ?err, "accept failed, shutting down");
                shared.drain().await;
                break;
            }
        }
    }
}

/// Registers an accepted connection and starts its read loop. The session
/// is inserted while holding the registry lock, so the read loop's own
/// removal path (which needs the same lock) cannot run before the insert.
async fn admit(shared: &Arc<ServerShared>, stream: TcpStream, peer: SocketAddr) {
    let id = peer.to_string();
    let Ok((reader, writer)) = Connection::from_stream(stream, peer).into_split() else {
        // A freshly wrapped stream always has both halves.
        return;
    };
    let writer = Arc::new(Mutex::new(writer));

    {
        let mut sessions = shared.sessions.lock().await;
        let task = tokio::spawn(run_session(
            id.clone(),
            reader,
            Arc::clone(&writer),
            Arc::clone(shared),
        ));
        sessions.insert(id.clone(), SessionHandle::new(writer, task.abort_handle()));
    }

    info!(session = %id, "client connected");
    shared.listener.on_client_connected(&id);
}
