//! Networking layer.
//!
//! Provides a [`Transport`] trait abstracting over the real WebSocket and
//! test channels, plus [`Link`], which tracks the connection lifecycle and
//! joins the game as soon as the socket opens.

use crate::error::Result;
use crate::protocol::{self, ClientMessage, ServerEvent};

use futures_util::{SinkExt as _, StreamExt as _};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Called from the socket task whenever something arrives for the UI.
pub type Wake = Arc<dyn Fn() + Send + Sync>;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Opened,
    Message(ServerEvent),
    Closed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { reason: String },
}

impl ConnectionState {
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Abstraction over a network transport so that client logic and tests can
/// work with both real sockets and in-memory channels.
pub trait Transport: Send + 'static {
    /// Queue a message for the server. Returns `false` if it was dropped.
    fn send(&self, msg: &ClientMessage) -> bool;
    /// Try to receive an event (non-blocking).
    fn try_recv(&mut self) -> Option<NetEvent>;
}

/// In-memory transport for testing.
pub struct MockTransport {
    pub tx: mpsc::UnboundedSender<ClientMessage>,
    pub rx: mpsc::UnboundedReceiver<NetEvent>,
}

/// The server side of a [`MockTransport`].
pub struct MockPeer {
    pub tx: mpsc::UnboundedSender<NetEvent>,
    pub rx: mpsc::UnboundedReceiver<ClientMessage>,
}

impl Transport for MockTransport {
    fn send(&self, msg: &ClientMessage) -> bool {
        self.tx.send(msg.clone()).is_ok()
    }

    fn try_recv(&mut self) -> Option<NetEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected [`MockTransport`] / [`MockPeer`] pair for testing.
pub fn mock_transport_pair() -> (MockTransport, MockPeer) {
    let (client_tx, peer_rx) = mpsc::unbounded_channel();
    let (peer_tx, client_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            tx: client_tx,
            rx: client_rx,
        },
        MockPeer {
            tx: peer_tx,
            rx: peer_rx,
        },
    )
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// One session with the server.
///
/// Nothing is sent before the socket opens or after it closes; the first
/// message on every session is `join_game`.
pub struct Link {
    transport: Box<dyn Transport>,
    state: ConnectionState,
    username: String,
}

impl Link {
    pub fn new(transport: Box<dyn Transport>, username: String) -> Self {
        Self {
            transport,
            state: ConnectionState::Connecting,
            username,
        }
    }

    pub const fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Send `msg` if the connection is open. Returns whether it went out.
    pub fn send(&self, msg: &ClientMessage) -> bool {
        if !self.state.is_open() {
            log::debug!("not connected, dropping {msg:?}");
            return false;
        }
        self.transport.send(msg)
    }

    /// Drain everything the transport has, updating the connection state.
    pub fn poll(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.transport.try_recv() {
            match event {
                NetEvent::Opened => {
                    self.state = ConnectionState::Open;
                    log::info!("connected, joining as {:?}", self.username);
                    self.send(&ClientMessage::JoinGame {
                        username: self.username.clone(),
                    });
                }
                NetEvent::Message(event) => {
                    if self.state.is_closed() {
                        continue;
                    }
                    events.push(event);
                }
                NetEvent::Closed { reason } => {
                    if !self.state.is_closed() {
                        log::info!("connection closed: {reason}");
                        self.state = ConnectionState::Closed { reason };
                    }
                }
            }
        }
        events
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// Real transport: a tokio task owns the socket and talks to the UI thread
/// over channels.
pub struct WsTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<NetEvent>,
}

impl WsTransport {
    /// Start connecting to `url` on `runtime`. Progress arrives as
    /// [`NetEvent`]s; `wake` is called after each one.
    pub fn connect(url: String, runtime: &tokio::runtime::Handle, wake: Wake) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        runtime.spawn(run_client(url, inbound_tx, outbound_rx, wake));
        Self { outbound, inbound }
    }
}

impl Transport for WsTransport {
    fn send(&self, msg: &ClientMessage) -> bool {
        match msg.to_json() {
            Ok(text) => self.outbound.send(text).is_ok(),
            Err(e) => {
                log::error!("failed to encode {msg:?}: {e}");
                false
            }
        }
    }

    fn try_recv(&mut self) -> Option<NetEvent> {
        self.inbound.try_recv().ok()
    }
}

async fn run_client(
    url: String,
    events: mpsc::UnboundedSender<NetEvent>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    wake: Wake,
) {
    let emit = |event: NetEvent| {
        if events.send(event).is_ok() {
            wake();
        }
    };

    let reason = match session(&url, &emit, &mut outbound).await {
        Ok(reason) => reason,
        Err(e) => {
            log::error!("connection to {url} failed: {e}");
            e.to_string()
        }
    };
    emit(NetEvent::Closed { reason });
}

/// Run one socket until it closes. Returns a human-readable close reason.
async fn session(
    url: &str,
    emit: &impl Fn(NetEvent),
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> Result<String> {
    let (socket, _) = connect_async(url).await?;
    log::info!("connected to {url}");
    emit(NetEvent::Opened);

    let (mut write, mut read) = socket.split();
    loop {
        tokio::select! {
            incoming = read.next() => match incoming {
                None => return Ok("server went away".into()),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(WsMessage::Text(text))) => match protocol::decode(&text) {
                    Ok(event) => emit(NetEvent::Message(event)),
                    Err(e) => log::warn!("dropping malformed message {:?}: {e}", protocol::preview(&text)),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    return Ok(frame.map_or_else(
                        || "closed by server".into(),
                        |f| format!("closed by server ({}): {}", f.code, f.reason.as_str()),
                    ));
                }
                Some(Ok(other)) => log::trace!("ignoring frame {other:?}"),
            },

            outgoing = outbound.recv() => match outgoing {
                Some(text) => write.send(WsMessage::text(text)).await?,
                None => {
                    if let Err(e) = write.close().await {
                        log::debug!("error sending close frame: {e}");
                    }
                    return Ok("client shut down".into());
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
