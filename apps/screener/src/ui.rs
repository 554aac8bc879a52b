//! Terminal front-end for a chat session.
//!
//! Knows nothing about the protocol: it renders snapshots and turns typed
//! lines into send intents.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::debug;

use crate::driver::SessionHandle;
use crate::models::{Message, Phase, Role, SessionSnapshot};

pub const CONNECTING: &str = "Connecting…";
pub const CONNECTED: &str = "Connected. Waiting for questions…";
pub const CONNECTION_CLOSED: &str = "Connection closed.";
pub const SESSION_FINISHED: &str = "Session finished.";
pub const CHAT_ENDED: &str = "Chat ended or not connected";
pub const TYPE_ANSWER: &str = "Type your answer…";

/// Status line for the current state, if one applies.
pub fn status_notice(snapshot: &SessionSnapshot) -> Option<&'static str> {
    match snapshot.phase {
        Phase::Idle => None,
        Phase::Connecting => Some(CONNECTING),
        Phase::Open if snapshot.transcript.is_empty() => Some(CONNECTED),
        Phase::Open => None,
        Phase::Closed if snapshot.ended => Some(SESSION_FINISHED),
        Phase::Closed => Some(CONNECTION_CLOSED),
    }
}

pub fn input_placeholder(snapshot: &SessionSnapshot) -> &'static str {
    if snapshot.input_enabled {
        TYPE_ANSWER
    } else {
        CHAT_ENDED
    }
}

pub fn render_message(message: &Message) -> String {
    match message.role {
        Role::User => format!("  you > {}", message.text),
        Role::Bot => format!("  bot > {}", message.text),
        Role::System => format!("      · {}", message.text),
    }
}

/// Writes only what changed since the previous call.
#[derive(Debug, Default)]
pub struct TerminalRenderer {
    printed: usize,
    last_notice: Option<&'static str>,
}

impl TerminalRenderer {
    pub fn render(&mut self, snapshot: &SessionSnapshot, out: &mut impl Write) -> io::Result<()> {
        for message in snapshot.transcript.iter().skip(self.printed) {
            writeln!(out, "{}", render_message(message))?;
        }
        self.printed = snapshot.transcript.len();

        let notice = status_notice(snapshot);
        if let Some(text) = notice.filter(|n| Some(*n) != self.last_notice) {
            writeln!(out, "      · {text}")?;
        }
        self.last_notice = notice;
        out.flush()
    }
}

/// Runs the terminal adapter until the session closes, stdin ends, or Ctrl-C.
pub async fn run_terminal(handle: SessionHandle) -> io::Result<()> {
    let mut state = handle.subscribe();
    let mut lines = spawn_stdin_reader();
    let mut renderer = TerminalRenderer::default();
    let mut stdout = io::stdout();

    let initial = state.borrow_and_update().clone();
    renderer.render(&initial, &mut stdout)?;

    loop {
        tokio::select! {
            changed = state.changed() => {
                let snapshot = state.borrow_and_update().clone();
                renderer.render(&snapshot, &mut stdout)?;
                if changed.is_err() || snapshot.phase == Phase::Closed {
                    break;
                }
            }
            line = lines.recv() => match line {
                Some(line) => {
                    let snapshot = handle.snapshot();
                    if !snapshot.input_enabled {
                        writeln!(stdout, "      · {}", input_placeholder(&snapshot))?;
                        continue;
                    }
                    if line.trim().is_empty() {
                        continue;
                    }
                    handle.send(line, snapshot.pending_question_id);
                }
                None => {
                    debug!("stdin closed");
                    handle.close();
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                handle.close();
                break;
            }
        }
    }

    Ok(())
}

/// Reads stdin on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn snapshot(phase: Phase, ended: bool, transcript: Vec<Message>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Uuid::nil(),
            phase,
            ended,
            input_enabled: phase == Phase::Open && !ended,
            pending_question_id: None,
            transcript,
        }
    }

    #[test]
    fn test_notices_follow_phase() {
        assert_eq!(status_notice(&snapshot(Phase::Idle, false, vec![])), None);
        assert_eq!(
            status_notice(&snapshot(Phase::Connecting, false, vec![])),
            Some(CONNECTING)
        );
        assert_eq!(
            status_notice(&snapshot(Phase::Open, false, vec![])),
            Some(CONNECTED)
        );
        assert_eq!(
            status_notice(&snapshot(Phase::Open, false, vec![Message::bot("Q", None)])),
            None
        );
        assert_eq!(
            status_notice(&snapshot(Phase::Closed, false, vec![Message::bot("Q", None)])),
            Some(CONNECTION_CLOSED)
        );
        assert_eq!(
            status_notice(&snapshot(Phase::Closed, true, vec![Message::system("Bye")])),
            Some(SESSION_FINISHED)
        );
    }

    #[test]
    fn test_placeholder_reflects_input_gate() {
        assert_eq!(input_placeholder(&snapshot(Phase::Open, false, vec![])), TYPE_ANSWER);
        assert_eq!(input_placeholder(&snapshot(Phase::Open, true, vec![])), CHAT_ENDED);
        assert_eq!(
            input_placeholder(&snapshot(Phase::Connecting, false, vec![])),
            CHAT_ENDED
        );
    }

    #[test]
    fn test_renderer_prints_each_entry_and_notice_once() {
        let mut renderer = TerminalRenderer::default();
        let mut out = Vec::new();

        renderer
            .render(&snapshot(Phase::Connecting, false, vec![]), &mut out)
            .unwrap();
        renderer
            .render(&snapshot(Phase::Connecting, false, vec![]), &mut out)
            .unwrap();
        renderer
            .render(
                &snapshot(Phase::Open, false, vec![Message::bot("Years of Rust?", Some("1".into()))]),
                &mut out,
            )
            .unwrap();
        renderer
            .render(
                &snapshot(
                    Phase::Closed,
                    true,
                    vec![
                        Message::bot("Years of Rust?", Some("1".into())),
                        Message::user("5"),
                        Message::system("Thanks"),
                    ],
                ),
                &mut out,
            )
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "      · Connecting…",
                "  bot > Years of Rust?",
                "  you > 5",
                "      · Thanks",
                "      · Session finished.",
            ]
        );
    }
}
