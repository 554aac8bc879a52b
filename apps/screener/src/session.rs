//! Session controller: the chat state machine.
//!
//! `Idle → Connecting → Open → Closed`, with `ended` raised only by an inbound
//! `end_session` frame. Every input is handled to completion before the next;
//! nothing here blocks or awaits. Failures are never returned to the caller:
//! they move the session to `Closed` and are logged.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::{self, ClientFrame};
use crate::endpoint::EndpointPolicy;
use crate::errors::ChatError;
use crate::models::{HandshakeContext, Message, Phase, Role, SessionSnapshot};
use crate::transport::{Connector, EventSink, Transport, TransportEvent};

/// Something the UI asks the session to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Send {
        text: String,
        question_id: Option<String>,
    },
    Close,
}

/// The single event queue a session consumes, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Transport(TransportEvent),
    Intent(Intent),
}

pub struct Session {
    id: Uuid,
    phase: Phase,
    ended: bool,
    disposed: bool,
    transcript: Vec<Message>,
    context: Option<HandshakeContext>,
    transport: Option<Box<dyn Transport>>,
    handshake_sent: bool,
    dropped_frames: usize,
}

impl Session {
    pub fn new(context: Option<HandshakeContext>) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: Phase::Idle,
            ended: false,
            disposed: false,
            transcript: Vec::new(),
            context,
            transport: None,
            handshake_sent: false,
            dropped_frames: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// True once `close()` ran or the session was dropped; all intents are refused.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn context(&self) -> Option<&HandshakeContext> {
        self.context.as_ref()
    }

    pub fn handshake_sent(&self) -> bool {
        self.handshake_sent
    }

    /// Inbound frames discarded because they were not valid JSON.
    pub fn dropped_frames(&self) -> usize {
        self.dropped_frames
    }

    pub fn input_enabled(&self) -> bool {
        self.phase == Phase::Open && !self.ended
    }

    /// Id of the newest bot question that no user entry has followed yet.
    pub fn pending_question_id(&self) -> Option<&str> {
        let last_bot = self.transcript.iter().rposition(|m| m.role == Role::Bot)?;
        let answered = self.transcript[last_bot..]
            .iter()
            .any(|m| m.role == Role::User);
        if answered {
            None
        } else {
            self.transcript[last_bot].question_id.as_deref()
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase,
            ended: self.ended,
            transcript: self.transcript.clone(),
            input_enabled: self.input_enabled(),
            pending_question_id: self.pending_question_id().map(str::to_string),
        }
    }

    /// `Idle → Connecting`. The transport is only built here, never while idle.
    pub fn open(&mut self, connector: &dyn Connector, policy: &EndpointPolicy, sink: EventSink) {
        if self.phase != Phase::Idle {
            debug!(session_id = %self.id, phase = ?self.phase, "open ignored");
            return;
        }

        match policy.resolve(self.context.as_ref()) {
            Ok(endpoint) => {
                info!(
                    session_id = %self.id,
                    source = ?endpoint.source,
                    "Opening chat session at {}",
                    endpoint.url
                );
                self.transport = Some(connector.connect(&endpoint.url, sink));
                self.phase = Phase::Connecting;
            }
            Err(e) => {
                warn!(session_id = %self.id, "Cannot resolve chat endpoint: {e}");
                self.phase = Phase::Closed;
            }
        }
    }

    pub fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Transport(event) => self.handle_transport(event),
            SessionInput::Intent(Intent::Send { text, question_id }) => {
                self.send(&text, question_id.as_deref());
            }
            SessionInput::Intent(Intent::Close) => self.close(),
        }
    }

    pub fn handle_transport(&mut self, event: TransportEvent) {
        match (self.phase, event) {
            (Phase::Connecting, TransportEvent::Connected) => self.on_connected(),
            (Phase::Open, TransportEvent::Frame(raw)) => self.on_frame(&raw),
            (Phase::Connecting | Phase::Open, TransportEvent::Closed { code, reason }) => {
                info!(session_id = %self.id, ?code, "Chat connection closed: {reason}");
                self.shut_down();
            }
            (Phase::Connecting | Phase::Open, TransportEvent::Errored(e)) => {
                warn!(session_id = %self.id, "Chat transport error: {e}");
                self.shut_down();
            }
            (phase, event) => {
                debug!(session_id = %self.id, ?phase, ?event, "Ignoring transport event");
            }
        }
    }

    /// Accepted only while open, not ended, and with non-blank text.
    /// Returns whether a frame was transmitted.
    pub fn send(&mut self, text: &str, question_id: Option<&str>) -> bool {
        let text = text.trim();
        if text.is_empty() || !self.input_enabled() {
            debug!(session_id = %self.id, phase = ?self.phase, ended = self.ended, "send rejected");
            return false;
        }

        let frame = ClientFrame::UserMessage {
            message: text.to_string(),
            question_id: question_id.map(str::to_string),
        };
        if let Err(e) = self.transmit(&frame) {
            warn!(session_id = %self.id, "Failed to send answer: {e}");
            self.shut_down();
            return false;
        }

        self.transcript.push(Message::user(text));
        true
    }

    /// Disposes the session. Safe in any phase and idempotent; the transcript stays readable.
    pub fn close(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if self.phase != Phase::Closed {
            info!(session_id = %self.id, phase = ?self.phase, "Closing chat session");
        }
        self.shut_down();
    }

    fn on_connected(&mut self) {
        self.phase = Phase::Open;
        let frame = ClientFrame::Context {
            message: self.context.clone(),
        };
        self.handshake_sent = true;
        match self.transmit(&frame) {
            Ok(()) => debug!(session_id = %self.id, "Handshake sent"),
            Err(e) => {
                warn!(session_id = %self.id, "Handshake failed: {e}");
                self.shut_down();
            }
        }
    }

    fn on_frame(&mut self, raw: &str) {
        let inbound = match codec::decode_server_frame(raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.dropped_frames += 1;
                warn!(session_id = %self.id, dropped = self.dropped_frames, "Dropping frame: {e}");
                return;
            }
        };

        let terminal = inbound.is_terminal();
        self.transcript.push(inbound.into_message());

        if terminal {
            info!(session_id = %self.id, "Interviewer ended the session");
            self.ended = true;
            self.shut_down();
        }
    }

    fn transmit(&mut self, frame: &ClientFrame) -> Result<(), ChatError> {
        let encoded = codec::encode(frame)?;
        self.transport
            .as_mut()
            .ok_or(ChatError::TransportGone)?
            .send(encoded)
    }

    fn shut_down(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.phase = Phase::Closed;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
