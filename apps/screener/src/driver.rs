//! Runs a `Session` on its own task: one input queue, one published snapshot per event.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::endpoint::EndpointPolicy;
use crate::models::{HandshakeContext, Phase, SessionSnapshot};
use crate::session::{Intent, Session, SessionInput};
use crate::transport::{Connector, EventSink};

/// The UI's side of a running session. Dropping every handle destroys the session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queues an answer. The session decides whether to accept it.
    pub fn send(&self, text: impl Into<String>, question_id: Option<String>) {
        let _ = self.inputs.send(SessionInput::Intent(Intent::Send {
            text: text.into(),
            question_id,
        }));
    }

    pub fn close(&self) {
        let _ = self.inputs.send(SessionInput::Intent(Intent::Close));
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }
}

/// Opens `context` in a new session and starts processing its queue.
///
/// The returned task resolves to the finished session once it reaches `Closed`,
/// so the final transcript can still be inspected.
pub fn spawn_session(
    context: Option<HandshakeContext>,
    connector: Arc<dyn Connector>,
    policy: EndpointPolicy,
) -> (SessionHandle, JoinHandle<Session>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = Session::new(context);
    let (state_tx, state_rx) = watch::channel(session.snapshot());
    let sink = EventSink::new(&tx);

    let task = tokio::spawn(run(session, connector, policy, sink, rx, state_tx));

    (
        SessionHandle {
            inputs: tx,
            state: state_rx,
        },
        task,
    )
}

async fn run(
    mut session: Session,
    connector: Arc<dyn Connector>,
    policy: EndpointPolicy,
    sink: EventSink,
    mut inputs: mpsc::UnboundedReceiver<SessionInput>,
    state: watch::Sender<SessionSnapshot>,
) -> Session {
    session.open(connector.as_ref(), &policy, sink);
    state.send_replace(session.snapshot());

    while session.phase() != Phase::Closed {
        let Some(input) = inputs.recv().await else {
            debug!(session_id = %session.id(), "All session handles dropped");
            session.close();
            break;
        };
        session.handle(input);
        state.send_replace(session.snapshot());
    }

    state.send_replace(session.snapshot());
    info!(
        session_id = %session.id(),
        ended = session.is_ended(),
        entries = session.transcript().len(),
        dropped_frames = session.dropped_frames(),
        "Chat session finished"
    );
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_server::{build_router, MockState};
    use crate::config::MockConfig;
    use crate::models::Role;
    use crate::session::tests::FakeConnector;
    use crate::transport::{TransportEvent, WsConnector};
    use std::time::Duration;

    async fn wait_until(
        rx: &mut watch::Receiver<SessionSnapshot>,
        pred: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if pred(&current) {
                        return current.clone();
                    }
                }
                if rx.changed().await.is_err() {
                    return rx.borrow().clone();
                }
            }
        })
        .await
        .expect("session did not reach the expected state in time")
    }

    async fn start_mock(questions: &[&str]) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = MockState::new(MockConfig {
            port: addr.port(),
            public_host: addr.to_string(),
            questions: questions.iter().map(|q| q.to_string()).collect(),
            rust_log: "info".to_string(),
        });
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        addr.to_string()
    }

    #[tokio::test]
    async fn test_full_interview_against_mock_backend() {
        let host = start_mock(&["How many years of Rust?", "Why this team?"]).await;
        let ctx = HandshakeContext::for_application(42)
            .with_user(Some(7))
            .with_websocket_url(Some(format!("ws://{host}/api/chat?applicationId=42&userId=7")));

        let (handle, task) = spawn_session(
            Some(ctx),
            Arc::new(WsConnector),
            EndpointPolicy::new(None, "http://localhost"),
        );
        let mut rx = handle.subscribe();

        let snap = wait_until(&mut rx, |s| s.pending_question_id.as_deref() == Some("1")).await;
        assert_eq!(snap.phase, Phase::Open);
        assert_eq!(snap.transcript[0].role, Role::System);
        handle.send("  5 years ", snap.pending_question_id.clone());

        let snap = wait_until(&mut rx, |s| s.pending_question_id.as_deref() == Some("2")).await;
        handle.send("Great mission", snap.pending_question_id.clone());

        let snap = wait_until(&mut rx, |s| s.phase == Phase::Closed).await;
        assert!(snap.ended);
        assert!(!snap.input_enabled);

        let session = task.await.unwrap();
        let roles: Vec<Role> = session.transcript().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::Bot,
                Role::User,
                Role::Bot,
                Role::User,
                Role::System,
                Role::System,
            ]
        );
        assert_eq!(session.transcript()[2].text, "5 years");
        assert!(session.is_ended());
    }

    #[tokio::test]
    async fn test_missing_ids_is_an_unexpected_close() {
        let host = start_mock(&["Q?"]).await;
        let (handle, task) = spawn_session(
            None,
            Arc::new(WsConnector),
            EndpointPolicy::new(Some(format!("ws://{host}/api/chat")), "http://localhost"),
        );
        let mut rx = handle.subscribe();

        let snap = wait_until(&mut rx, |s| s.phase == Phase::Closed).await;
        assert!(!snap.ended);
        assert!(snap.transcript.is_empty());
        drop(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_close_intent_stops_the_driver() {
        let connector = FakeConnector::default();
        let (handle, task) = spawn_session(
            None,
            Arc::new(connector.clone()),
            EndpointPolicy::new(None, "http://localhost"),
        );
        handle.close();

        let session = task.await.unwrap();
        assert_eq!(session.phase(), Phase::Closed);
        assert!(session.is_disposed());
        assert!(connector.wire.lock().unwrap().closed);
        assert!(connector.wire.lock().unwrap().sent.is_empty());
        assert_eq!(handle.snapshot().phase, Phase::Closed);
    }

    #[tokio::test]
    async fn test_dropping_the_handle_destroys_the_session() {
        let connector = FakeConnector::default();
        let (handle, task) = spawn_session(
            None,
            Arc::new(connector.clone()),
            EndpointPolicy::new(None, "http://localhost"),
        );
        drop(handle);

        let session = task.await.unwrap();
        assert!(session.is_disposed());
        assert!(connector.wire.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn test_inputs_are_processed_in_queue_order() {
        let connector = FakeConnector::default();
        let (handle, task) = spawn_session(
            None,
            Arc::new(connector.clone()),
            EndpointPolicy::new(None, "http://localhost"),
        );
        let mut rx = handle.subscribe();

        // Stand in for the socket task by feeding transport events into the same queue.
        let events = [
            TransportEvent::Connected,
            TransportEvent::Frame(r#"{"type":"question","text":"Q1","question_id":"1"}"#.into()),
        ];
        for event in events {
            handle.inputs.send(SessionInput::Transport(event)).unwrap();
        }
        handle.send("A1", Some("1".to_string()));
        handle
            .inputs
            .send(SessionInput::Transport(TransportEvent::Frame(
                r#"{"type":"end_session","text":"Done"}"#.into(),
            )))
            .unwrap();
        handle.send("too late", None);

        let snap = wait_until(&mut rx, |s| s.phase == Phase::Closed).await;
        let texts: Vec<&str> = snap.transcript.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Q1", "A1", "Done"]);
        assert!(snap.ended);

        let sent = connector.wire.lock().unwrap().sent.clone();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains(r#""type":"context""#));
        assert!(sent[1].contains(r#""question_id":"1""#));
        drop(task.await.unwrap());
    }
}
