//! Line-oriented wrapper around one TCP stream.
//!
//! [`Connection`] is the leaf the rest of the crate builds on: it knows how
//! to move whole text lines across a socket and nothing about client or
//! server roles. [`Connection::into_split`] hands out the two halves so a
//! dedicated read loop and concurrent writers can share one socket.

use std::{net::SocketAddr, time::Duration};

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    time::timeout,
};

use crate::error::NetError;

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Reads one line, without its terminator. `Ok(None)` is the end-of-stream
/// signal for a graceful peer close.
pub(crate) async fn read_line_from<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let bytes = reader.read_line(&mut line).await?;
    if bytes == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(LINE_ENDINGS).to_string()))
}

/// Appends the line terminator, writes the whole frame in one call, and
/// flushes so the peer sees it promptly. Rejects embedded terminators rather
/// than corrupt the framing.
pub(crate) async fn write_line_to<W>(writer: &mut W, text: &str) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    if text.contains(LINE_ENDINGS) {
        return Err(NetError::EmbeddedNewline);
    }
    let mut encoded = Vec::with_capacity(text.len() + 1);
    encoded.extend_from_slice(text.as_bytes());
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Read half of a split [`Connection`].
pub struct LineReader {
    inner: BufReader<OwnedReadHalf>,
}

impl LineReader {
    pub(crate) fn new(half: OwnedReadHalf) -> Self {
        Self {
            inner: BufReader::new(half),
        }
    }

    /// Blocks until a full line arrives; `Ok(None)` on graceful peer close.
    pub async fn read_line(&mut self) -> Result<Option<String>, NetError> {
        Ok(read_line_from(&mut self.inner).await?)
    }
}

/// Write half of a split [`Connection`]. Each `write_line` emits the whole
/// line in a single write, so concurrent senders serialized on this value
/// never interleave partial lines.
pub struct LineWriter {
    inner: OwnedWriteHalf,
}

impl LineWriter {
    pub(crate) fn new(half: OwnedWriteHalf) -> Self {
        Self { inner: half }
    }

    pub async fn write_line(&mut self, text: &str) -> Result<(), NetError> {
        write_line_to(&mut self.inner, text).await
    }

    /// Best-effort shutdown of the write half; the peer observes end of stream.
    pub(crate) async fn shutdown(&mut self) {
        let _ = self.inner.shutdown().await;
    }
}

/// One live socket plus its line reader and writer.
///
/// Once closed, every further read or write fails with [`NetError::Closed`];
/// a `Connection` is never reopened, a new one is created instead.
pub struct Connection {
    peer: SocketAddr,
    local: SocketAddr,
    halves: Option<(LineReader, LineWriter)>,
}

impl Connection {
    /// Establishes a TCP connection to `addr`, bounded by `limit`.
    pub async fn open(addr: SocketAddr, limit: Duration) -> Result<Self, NetError> {
        let stream = match timeout(limit, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(NetError::Connect { addr, source }),
            Err(_) => return Err(NetError::ConnectTimeout { addr }),
        };
        Ok(Self::from_stream(stream, addr))
    }

    /// Wraps an already-established stream, e.g. one returned by accept.
    pub fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let local = stream
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        let (read, write) = stream.into_split();
        Self {
            peer,
            local,
            halves: Some((LineReader::new(read), LineWriter::new(write))),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Sends one line to the peer.
    pub async fn write_line(&mut self, text: &str) -> Result<(), NetError> {
        match &mut self.halves {
            Some((_, writer)) => writer.write_line(text).await,
            None => Err(NetError::Closed),
        }
    }

    /// Blocks until a full line arrives; `Ok(None)` on graceful peer close.
    pub async fn read_line(&mut self) -> Result<Option<String>, NetError> {
        match &mut self.halves {
            Some((reader, _)) => reader.read_line().await,
            None => Err(NetError::Closed),
        }
    }

    /// Idempotent: closing twice is a no-op. Releases both halves of the
    /// socket; subsequent operations fail with [`NetError::Closed`].
    pub async fn close(&mut self) {
        if let Some((_, mut writer)) = self.halves.take() {
            writer.shutdown().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.halves.is_none()
    }

    /// Splits into independently owned halves for a read loop plus writers.
    pub fn into_split(self) -> Result<(LineReader, LineWriter), NetError> {
        self.halves.ok_or(NetError::Closed)
    }
}
