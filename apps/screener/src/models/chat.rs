use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Bot,
    System,
}

/// Connection phase of a chat session. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
    /// Only set on `Bot` entries that came from a `question` frame carrying an id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text.into(), None)
    }

    pub fn bot(text: impl Into<String>, question_id: Option<String>) -> Self {
        Self::new(Role::Bot, text.into(), question_id)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text.into(), None)
    }

    fn new(role: Role, text: String, question_id: Option<String>) -> Self {
        Self {
            role,
            text,
            question_id,
            at: Utc::now(),
        }
    }
}

/// Read-only view of a session handed to the UI layer after every processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: Phase,
    pub ended: bool,
    pub transcript: Vec<Message>,
    /// `phase == Open && !ended`; the UI gates its input control on this.
    pub input_enabled: bool,
    /// Id of the latest unanswered question, if it carried one.
    pub pending_question_id: Option<String>,
}
