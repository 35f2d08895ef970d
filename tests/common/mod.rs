#![allow(dead_code)]

use std::time::Duration;

use anyhow::{anyhow, Result};
use linewire::{ClientListener, ServerListener};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    time::timeout,
};

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Connected(String),
    Message { session: String, text: String },
    Disconnected(String),
}

type ReplyFn = Box<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Server listener that records every hook invocation on a channel and
/// answers messages with a configurable reply function.
pub struct RecordingServerListener {
    events: UnboundedSender<ServerEvent>,
    reply: ReplyFn,
}

impl RecordingServerListener {
    /// Recorder that never replies.
    pub fn silent() -> (Self, UnboundedReceiver<ServerEvent>) {
        Self::with_reply(Box::new(|_, _| None))
    }

    /// Recorder answering each message through `reply`.
    pub fn with_reply(reply: ReplyFn) -> (Self, UnboundedReceiver<ServerEvent>) {
        let (events, rx) = unbounded_channel();
        (Self { events, reply }, rx)
    }
}

impl ServerListener for RecordingServerListener {
    fn on_message(&self, session_id: &str, text: &str) -> Option<String> {
        let _ = self.events.send(ServerEvent::Message {
            session: session_id.to_string(),
            text: text.to_string(),
        });
        (self.reply)(session_id, text)
    }

    fn on_client_connected(&self, session_id: &str) {
        let _ = self
            .events
            .send(ServerEvent::Connected(session_id.to_string()));
    }

    fn on_client_disconnected(&self, session_id: &str) {
        let _ = self
            .events
            .send(ServerEvent::Disconnected(session_id.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Message(String),
    Disconnected,
}

/// Client listener that records every hook invocation on a channel.
pub struct RecordingClientListener {
    events: UnboundedSender<ClientEvent>,
}

impl RecordingClientListener {
    pub fn new() -> (Self, UnboundedReceiver<ClientEvent>) {
        let (events, rx) = unbounded_channel();
        (Self { events }, rx)
    }
}

impl ClientListener for RecordingClientListener {
    fn on_message(&self, text: &str) {
        let _ = self.events.send(ClientEvent::Message(text.to_string()));
    }

    fn on_connected(&self) {
        let _ = self.events.send(ClientEvent::Connected);
    }

    fn on_disconnected(&self) {
        let _ = self.events.send(ClientEvent::Disconnected);
    }
}

pub async fn next_event<T>(rx: &mut UnboundedReceiver<T>) -> Result<T> {
    match timeout(EVENT_TIMEOUT, rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => Err(anyhow!("event channel closed")),
        Err(_) => Err(anyhow!("timed out waiting for an event")),
    }
}

/// Asserts that no event arrives within `window`.
pub async fn expect_quiet<T: std::fmt::Debug>(
    rx: &mut UnboundedReceiver<T>,
    window: Duration,
) -> Result<()> {
    match timeout(window, rx.recv()).await {
        Err(_) => Ok(()),
        Ok(event) => Err(anyhow!("expected silence, got {event:?}")),
    }
}
