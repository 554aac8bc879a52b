//! REST collaborators that produce the chat handshake context.
//!
//! Applying to a job (or resuming an application) returns the application id
//! and the chat endpoint, which together become the `HandshakeContext`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::ChatError;
use crate::models::HandshakeContext;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyRequest {
    pub job_id: i64,
    pub cv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub candidate: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResponse {
    pub application_id: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub interview_ready: bool,
    #[serde(default)]
    pub scoring_completed: bool,
    #[serde(default)]
    pub websocket_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewTicket {
    pub application_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub interview_ready: bool,
    #[serde(default)]
    pub websocket_url: Option<String>,
}

impl InterviewTicket {
    pub fn into_context(self) -> HandshakeContext {
        let job_description = match (&self.job_title, &self.company) {
            (None, None) => None,
            (title, company) => Some(json!({ "title": title, "company": company })),
        };
        HandshakeContext {
            job_description,
            ..HandshakeContext::for_application(self.application_id)
                .with_user(self.user_id)
                .with_websocket_url(self.websocket_url)
        }
    }
}

impl ApplyResponse {
    pub fn into_context(self, user_id: Option<i64>) -> HandshakeContext {
        HandshakeContext::for_application(self.application_id)
            .with_user(user_id)
            .with_websocket_url(self.websocket_url)
    }
}

/// Client for the recruiting backend's application endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Result<Self, ChatError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    /// POST /applications/apply_with_text
    pub async fn apply_with_text(&self, req: &ApplyRequest) -> Result<ApplyResponse, ChatError> {
        self.post_json("/applications/apply_with_text", Some(req)).await
    }

    /// POST /applications/{id}/start_interview
    pub async fn start_interview(&self, application_id: i64) -> Result<InterviewTicket, ChatError> {
        self.post_json::<(), _>(
            &format!("/applications/{application_id}/start_interview"),
            None,
        )
        .await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ChatError> {
        let url = format!("{}{path}", self.base);
        debug!("POST {url}");

        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response.json().await?)
    }
}

/// Pulls a readable message out of an error body: FastAPI's `detail`,
/// our own `error.message` envelope, or the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.pointer("/error/message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Reads a CV as plain text. PDFs are converted locally.
pub async fn read_cv_text(path: &Path) -> Result<String, ChatError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    let text = if is_pdf {
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
            .await
            .map_err(|e| ChatError::CvRead(e.to_string()))?
            .map_err(|e| ChatError::CvRead(format!("{}: {e}", path.display())))?
    } else {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ChatError::CvRead(format!("{}: {e}", path.display())))?
    };

    if text.trim().is_empty() {
        return Err(ChatError::CvRead(format!("{} contains no text", path.display())));
    }
    Ok(text)
}

/// Where the handshake context for a new chat comes from.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn load(&self, api: &ApiClient) -> Result<Option<HandshakeContext>, ChatError>;
}

/// Open the chat without a context; the handshake carries `null`.
pub struct NoContext;

#[async_trait]
impl ContextSource for NoContext {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn load(&self, _api: &ApiClient) -> Result<Option<HandshakeContext>, ChatError> {
        Ok(None)
    }
}

/// Resume the interview for an existing application.
pub struct StartInterview {
    pub application_id: i64,
    pub user_id: Option<i64>,
}

#[async_trait]
impl ContextSource for StartInterview {
    fn name(&self) -> &'static str {
        "start_interview"
    }

    async fn load(&self, api: &ApiClient) -> Result<Option<HandshakeContext>, ChatError> {
        let ticket = api.start_interview(self.application_id).await?;
        info!(
            "Interview ready for application {} ({} at {})",
            ticket.application_id,
            ticket.job_title.as_deref().unwrap_or("unknown role"),
            ticket.company.as_deref().unwrap_or("unknown company")
        );
        let mut context = ticket.into_context();
        if context.user_id.is_none() {
            context.user_id = self.user_id;
        }
        Ok(Some(context))
    }
}

/// Submit a new application from a CV on disk, then chat about it.
pub struct ApplyWithText {
    pub job_id: i64,
    pub cv_path: PathBuf,
    pub cover_letter: Option<String>,
    pub user_id: Option<i64>,
}

#[async_trait]
impl ContextSource for ApplyWithText {
    fn name(&self) -> &'static str {
        "apply_with_text"
    }

    async fn load(&self, api: &ApiClient) -> Result<Option<HandshakeContext>, ChatError> {
        let cv = read_cv_text(&self.cv_path).await?;
        let request = ApplyRequest {
            job_id: self.job_id,
            cv,
            cover_letter: self.cover_letter.clone(),
            candidate: json!({}),
            user_id: self.user_id,
        };
        let response = api.apply_with_text(&request).await?;
        info!(
            "Application {} submitted for job {}",
            response.application_id, self.job_id
        );
        Ok(Some(response.into_context(self.user_id)))
    }
}

/// Picks the context source: resume an application, apply with a CV, or no context.
pub fn source_for(config: &Config) -> Box<dyn ContextSource> {
    if let Some(application_id) = config.application_id {
        return Box::new(StartInterview {
            application_id,
            user_id: config.user_id,
        });
    }
    match (config.job_id, &config.cv_path) {
        (Some(job_id), Some(cv_path)) => Box::new(ApplyWithText {
            job_id,
            cv_path: cv_path.clone(),
            cover_letter: config.cover_letter.clone(),
            user_id: config.user_id,
        }),
        _ => Box::new(NoContext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_start_interview_builds_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/applications/42/start_interview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "application_id": 42,
                "user_id": 7,
                "job_title": "Rust Engineer",
                "company": "Acme",
                "interview_ready": true,
                "websocket_url": "ws://localhost:8000/api/chat?applicationId=42&userId=7"
            })))
            .mount(&server)
            .await;

        let api = ApiClient::new(format!("{}/api/", server.uri())).unwrap();
        let source = StartInterview {
            application_id: 42,
            user_id: None,
        };
        let context = source.load(&api).await.unwrap().unwrap();

        assert_eq!(context.application_id, Some(42));
        assert_eq!(context.user_id, Some(7));
        assert_eq!(context.purpose.as_deref(), Some("answer_questions"));
        assert_eq!(
            context.websocket_url.as_deref(),
            Some("ws://localhost:8000/api/chat?applicationId=42&userId=7")
        );
        assert_eq!(
            context.job_description,
            Some(json!({"title": "Rust Engineer", "company": "Acme"}))
        );
    }

    #[tokio::test]
    async fn test_api_error_uses_detail_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/applications/5/start_interview"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Application not found"})),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(format!("{}/api", server.uri())).unwrap();
        match api.start_interview(5).await {
            Err(ChatError::Api { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Application not found");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_with_text_sends_cv_and_returns_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/applications/apply_with_text"))
            .and(body_partial_json(json!({"job_id": 3, "cv": "Ten years of Rust.\n", "user_id": 9})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "application_id": 11,
                "message": "Application submitted successfully.",
                "interview_ready": true,
                "scoring_completed": false,
                "websocket_url": "ws://localhost:8000/api/chat?applicationId=11&userId=9"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cv = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(cv, "Ten years of Rust.").unwrap();

        let api = ApiClient::new(format!("{}/api", server.uri())).unwrap();
        let source = ApplyWithText {
            job_id: 3,
            cv_path: cv.path().to_path_buf(),
            cover_letter: None,
            user_id: Some(9),
        };
        let context = source.load(&api).await.unwrap().unwrap();
        assert_eq!(context.application_id, Some(11));
        assert_eq!(context.user_id, Some(9));
        assert!(context.websocket_url.unwrap().contains("applicationId=11"));
    }

    #[tokio::test]
    async fn test_empty_cv_is_rejected_before_any_request() {
        let cv = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let err = read_cv_text(cv.path()).await.unwrap_err();
        assert!(matches!(err, ChatError::CvRead(_)));
    }

    #[tokio::test]
    async fn test_no_context_source() {
        let api = ApiClient::new("http://localhost:1/api").unwrap();
        assert!(NoContext.load(&api).await.unwrap().is_none());
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
        assert_eq!(
            error_message(r#"{"error":{"code":"NOT_FOUND","message":"Job 3 not found"}}"#),
            "Job 3 not found"
        );
    }

    #[test]
    fn test_source_for_picks_by_configuration() {
        let config = |pairs: &'static [(&'static str, &'static str)]| {
            Config::from_lookup(move |key| {
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.to_string())
            })
            .unwrap()
        };

        let resume = config(&[
            ("SCREENER_APPLICATION_ID", "4"),
            ("SCREENER_JOB_ID", "3"),
            ("SCREENER_CV_PATH", "/tmp/cv.pdf"),
        ]);
        assert_eq!(source_for(&resume).name(), "start_interview");

        let apply = config(&[("SCREENER_JOB_ID", "3"), ("SCREENER_CV_PATH", "/tmp/cv.pdf")]);
        assert_eq!(source_for(&apply).name(), "apply_with_text");

        assert_eq!(source_for(&config(&[])).name(), "none");
    }
}
