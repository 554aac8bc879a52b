use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::codec::{self, ClientFrame, ServerFrame};
use crate::models::HandshakeContext;

use super::MockState;

const MISSING_PARAMS: &str = "Missing required parameters: applicationId and userId";
const NO_QUESTIONS: &str =
    "Based on my analysis, I don't have any additional questions. Your application looks great!";
const THANKS: &str = "Thank you for your detailed answers! I have all the information I need.";
const SUBMITTED: &str =
    "Your application has been submitted to the recruiter. Good luck with your application!";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatParams {
    pub application_id: Option<i64>,
    pub user_id: Option<i64>,
}

/// Fixed question list walked one answer at a time.
#[derive(Debug)]
pub struct InterviewScript {
    questions: Vec<String>,
    asked: usize,
    finished: bool,
}

impl InterviewScript {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            asked: 0,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Greeting plus the first question, or the whole farewell when there is nothing to ask.
    pub fn opening(&mut self, context: Option<&HandshakeContext>) -> Vec<ServerFrame> {
        let greeting = match context.and_then(|c| c.application_id) {
            Some(id) => format!(
                "Hello! Thank you for application #{id}. I've reviewed it and have some personalized questions to better understand your qualifications."
            ),
            None => "Hello! I have some questions to better understand your qualifications."
                .to_string(),
        };
        let mut frames = vec![ServerFrame::SystemMessage { text: greeting }];

        if self.questions.is_empty() {
            self.finished = true;
            frames.push(ServerFrame::SystemMessage {
                text: NO_QUESTIONS.to_string(),
            });
            frames.push(ServerFrame::EndSession {
                text: SUBMITTED.to_string(),
            });
        } else {
            frames.push(self.next_question());
        }
        frames
    }

    /// Blank answers and answers after the farewell produce nothing.
    pub fn answer(&mut self, answer: &str, question_id: Option<&str>) -> Vec<ServerFrame> {
        if self.finished || answer.trim().is_empty() {
            return Vec::new();
        }
        debug!(?question_id, asked = self.asked, "Answer received");

        if self.asked < self.questions.len() {
            return vec![self.next_question()];
        }

        self.finished = true;
        vec![
            ServerFrame::SystemMessage {
                text: THANKS.to_string(),
            },
            ServerFrame::EndSession {
                text: SUBMITTED.to_string(),
            },
        ]
    }

    fn next_question(&mut self) -> ServerFrame {
        let text = self.questions[self.asked].clone();
        self.asked += 1;
        ServerFrame::Question {
            text,
            question_id: Some(self.asked.to_string()),
        }
    }
}

/// GET /api/chat?applicationId=&userId= (WebSocket)
pub async fn handle_chat_socket(
    ws: WebSocketUpgrade,
    State(state): State<MockState>,
    Query(params): Query<ChatParams>,
) -> Response {
    ws.on_upgrade(move |socket| run_interview(socket, state, params))
}

async fn run_interview(mut socket: WebSocket, state: MockState, params: ChatParams) {
    let (Some(application_id), Some(user_id)) = (params.application_id, params.user_id) else {
        warn!(
            "Rejecting chat socket: applicationId={:?}, userId={:?}",
            params.application_id, params.user_id
        );
        close(&mut socket, close_code::POLICY, MISSING_PARAMS).await;
        return;
    };
    info!(application_id, user_id, "Interview socket accepted");

    let context = match next_client_frame(&mut socket).await {
        Some(ClientFrame::Context { message }) => message,
        Some(other) => {
            warn!(?other, "Expected a context handshake first");
            close(&mut socket, close_code::PROTOCOL, "Expected context handshake").await;
            return;
        }
        None => return,
    };
    debug!(?context, "Handshake received");

    let mut script = InterviewScript::new(state.config.questions.clone());
    if send_frames(&mut socket, script.opening(context.as_ref()))
        .await
        .is_err()
    {
        return;
    }

    while !script.is_finished() {
        match next_client_frame(&mut socket).await {
            Some(ClientFrame::UserMessage {
                message,
                question_id,
            }) => {
                let frames = script.answer(&message, question_id.as_deref());
                if send_frames(&mut socket, frames).await.is_err() {
                    return;
                }
            }
            Some(ClientFrame::Context { .. }) => warn!("Ignoring repeated handshake"),
            None => {
                info!(application_id, "Applicant left before the interview finished");
                return;
            }
        }
    }

    info!(application_id, "Interview complete");
    close(&mut socket, close_code::NORMAL, "Interview complete").await;
}

async fn next_client_frame(socket: &mut WebSocket) -> Option<ClientFrame> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(text)) => match codec::decode_client_frame(&text) {
                Ok(frame) => return Some(frame),
                Err(e) => warn!("Ignoring malformed applicant frame: {e}"),
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(e) => {
                warn!("Interview socket error: {e}");
                return None;
            }
        }
    }
    None
}

async fn send_frames(socket: &mut WebSocket, frames: Vec<ServerFrame>) -> Result<(), axum::Error> {
    for frame in frames {
        let text = codec::encode(&frame).map_err(axum::Error::new)?;
        socket.send(Message::Text(text)).await?;
    }
    Ok(())
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
