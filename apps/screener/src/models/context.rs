use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Purpose tag the web client attaches when a chat follows an application.
pub const ANSWER_QUESTIONS: &str = "answer_questions";

/// Handshake payload sent as the first frame of a session.
///
/// Treated as opaque by the protocol: unknown keys survive a round trip in `extra`.
/// `websocket_url` doubles as the caller-supplied chat endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_description: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HandshakeContext {
    pub fn for_application(application_id: i64) -> Self {
        Self {
            application_id: Some(application_id),
            purpose: Some(ANSWER_QUESTIONS.to_string()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_websocket_url(mut self, url: Option<String>) -> Self {
        self.websocket_url = url;
        self
    }
}
