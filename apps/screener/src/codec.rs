//! Wire codec for the screening chat protocol: JSON text frames tagged by `type`.
//!
//! Pure, no I/O. Both directions are modelled so the mock interviewer can speak
//! the server side of the same protocol.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::ChatError;
use crate::models::{HandshakeContext, Message};

/// Frames the interviewer backend sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    SystemMessage {
        text: String,
    },
    Question {
        text: String,
        #[serde(
            default,
            deserialize_with = "question_id",
            skip_serializing_if = "Option::is_none"
        )]
        question_id: Option<String>,
    },
    EndSession {
        text: String,
    },
}

/// Frames the applicant's client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Always serialized with `message`, even when it is `null`.
    Context { message: Option<HandshakeContext> },
    UserMessage {
        message: String,
        #[serde(
            default,
            deserialize_with = "question_id",
            skip_serializing_if = "Option::is_none"
        )]
        question_id: Option<String>,
    },
}

/// Result of decoding one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Known(ServerFrame),
    /// Valid JSON that is not a recognized frame. Surfaced to the transcript, never dropped.
    Unrecognized(Value),
}

impl Inbound {
    /// True for `end_session`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Inbound::Known(ServerFrame::EndSession { .. }))
    }

    pub fn into_message(self) -> Message {
        match self {
            Inbound::Known(ServerFrame::SystemMessage { text })
            | Inbound::Known(ServerFrame::EndSession { text }) => Message::system(text),
            Inbound::Known(ServerFrame::Question { text, question_id }) => {
                Message::bot(text, question_id)
            }
            Inbound::Unrecognized(raw) => Message::system(raw.to_string()),
        }
    }
}

/// Decodes a frame from the backend. Only non-JSON input is an error.
pub fn decode_server_frame(raw: &str) -> Result<Inbound, ChatError> {
    let value: Value = serde_json::from_str(raw).map_err(ChatError::Decode)?;
    Ok(match ServerFrame::deserialize(&value) {
        Ok(frame) => Inbound::Known(frame),
        Err(_) => Inbound::Unrecognized(value),
    })
}

pub fn decode_client_frame(raw: &str) -> Result<ClientFrame, ChatError> {
    serde_json::from_str(raw).map_err(ChatError::Decode)
}

pub fn encode<T: Serialize>(frame: &T) -> Result<String, ChatError> {
    serde_json::to_string(frame).map_err(ChatError::Encode)
}

/// Accepts string or numeric ids; numbers are normalised to their decimal text.
fn question_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Repr>::deserialize(deserializer)?.map(|repr| match repr {
        Repr::Text(s) => s,
        Repr::Number(n) => n.to_string(),
    }))
}
