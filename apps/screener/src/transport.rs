//! Transport binding: one WebSocket per session over `tokio-tungstenite`.
//!
//! The socket runs in its own task and reports exactly four kinds of signal
//! (`Connected`, `Frame`, `Closed`, `Errored`) into the session's input queue.
//! The controller talks back through a `Transport` handle.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::errors::ChatError;
use crate::session::SessionInput;

/// How long to wait for the peer to acknowledge our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Frame(String),
    Closed { code: Option<u16>, reason: String },
    Errored(String),
}

/// Where a transport reports its events.
///
/// Holds a weak sender so a running socket never keeps a session's queue
/// alive on its own once the UI has let go of it.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::WeakUnboundedSender<SessionInput>,
}

impl EventSink {
    pub fn new(tx: &mpsc::UnboundedSender<SessionInput>) -> Self {
        Self { tx: tx.downgrade() }
    }

    /// Returns false once the session's queue is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.tx.upgrade() {
            Some(tx) => tx.send(SessionInput::Transport(event)).is_ok(),
            None => false,
        }
    }
}

/// Controller-side handle to a live connection.
pub trait Transport: Send {
    fn send(&mut self, frame: String) -> Result<(), ChatError>;

    /// Idempotent.
    fn close(&mut self);
}

/// Builds one transport per session, on demand.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &str, sink: EventSink) -> Box<dyn Transport>;
}

/// Production connector. Must be called from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, endpoint: &str, sink: EventSink) -> Box<dyn Transport> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_socket(endpoint.to_string(), cmd_rx, sink));
        Box::new(WsTransport {
            commands: cmd_tx,
            closed: false,
        })
    }
}

enum Command {
    Send(String),
    Close,
}

struct WsTransport {
    commands: mpsc::UnboundedSender<Command>,
    closed: bool,
}

impl Transport for WsTransport {
    fn send(&mut self, frame: String) -> Result<(), ChatError> {
        if self.closed {
            return Err(ChatError::TransportGone);
        }
        self.commands
            .send(Command::Send(frame))
            .map_err(|_| ChatError::TransportGone)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.commands.send(Command::Close);
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_socket(
    endpoint: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    sink: EventSink,
) {
    debug!("Connecting to {endpoint}");

    // A close request while the handshake is in flight abandons the connection.
    let ws = tokio::select! {
        biased;
        _ = commands.recv() => {
            debug!("Transport closed before {endpoint} connected");
            return;
        }
        result = connect_async(endpoint.as_str()) => match result {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!("WebSocket connect to {endpoint} failed: {e}");
                sink.emit(TransportEvent::Errored(e.to_string()));
                return;
            }
        },
    };

    info!("WebSocket connected to {endpoint}");
    if !sink.emit(TransportEvent::Connected) {
        return;
    }

    let (mut writer, mut reader) = ws.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Send(text)) => {
                    if let Err(e) = writer.send(Message::text(text)).await {
                        warn!("WebSocket send failed: {e}");
                        sink.emit(TransportEvent::Errored(e.to_string()));
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, writer.close()).await;
                    debug!("WebSocket to {endpoint} closed locally");
                    break;
                }
            },
            msg = reader.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    sink.emit(TransportEvent::Frame(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                        .unwrap_or((None, String::new()));
                    info!("WebSocket closed by peer: code={code:?} reason={reason}");
                    sink.emit(TransportEvent::Closed { code, reason });
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {e}");
                    sink.emit(TransportEvent::Errored(e.to_string()));
                    break;
                }
                None => {
                    sink.emit(TransportEvent::Closed { code: None, reason: String::new() });
                    break;
                }
            },
        }
    }
}
