//! Server-side peer handle: one accepted connection, one dedicated read loop.

use std::sync::Arc;

use tokio::{sync::Mutex, task::AbortHandle};
use tracing::{debug, warn};

use crate::{
    connection::{LineReader, LineWriter},
    server::ServerShared,
};

/// Registry entry for one live session. The writer is shared behind a lock
/// so dispatch replies, targeted sends, and broadcasts serialize per
/// connection; the read loop never touches it except through dispatch.
pub(crate) struct SessionHandle {
    writer: Arc<Mutex<LineWriter>>,
    read_task: AbortHandle,
}

impl SessionHandle {
    pub(crate) fn new(writer: Arc<Mutex<LineWriter>>, read_task: AbortHandle) -> Self {
        Self { writer, read_task }
    }

    /// Clone of the shared writer, for sends that must not hold the
    /// registry lock across network I/O.
    pub(crate) fn writer(&self) -> Arc<Mutex<LineWriter>> {
        Arc::clone(&self.writer)
    }

    /// Stops the read loop and shuts the connection down. The abort comes
    /// first, and the writer shutdown runs detached: the writer lock may be
    /// parked behind a send to a peer that stopped reading, and removal
    /// must never wait on that.
    pub(crate) fn close(self) {
        let SessionHandle { writer, read_task } = self;
        read_task.abort();
        tokio::spawn(async move {
            writer.lock().await.shutdown().await;
        });
    }
}

/// Per-session read loop: dispatch each line through the application hook,
/// write back any reply, and on end of stream or failure remove this
/// session from the registry exactly once. The removal is idempotent, so a
/// race with an external disconnect resolves to a single winner.
pub(crate) async fn run_session(
    id: String,
    mut reader: LineReader,
    writer: Arc<Mutex<LineWriter>>,
    shared: Arc<ServerShared>,
) {
    loop {
        match reader.read_line().await {
            Ok(Some(line)) => {
                let reply = shared.listener.on_message(&id, &line);
                if let Some(reply) = reply {
                    let result = writer.lock().await.write_line(&reply).await;
                    if let Err(err) = result {
                        debug!(session = %id, error = ?err, "failed to deliver reply");
                        break;
                    }
                }
            }
            Ok(None) => {
                debug!(session = %id, "peer closed the connection");
                break;
            }
            Err(err) => {
                warn!(session = %id, error = ?err, "session read failed");
                break;
            }
        }
    }

    shared.remove_session(&id).await;
}
