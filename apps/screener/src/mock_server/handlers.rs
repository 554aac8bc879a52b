use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::api_client::{ApplyRequest, ApplyResponse, InterviewTicket};
use crate::errors::ServerError;

use super::MockState;

/// Every mock application belongs to this applicant unless the request names one.
pub const MOCK_APPLICANT_ID: i64 = 1;
const MOCK_JOB_TITLE: &str = "Backend Engineer";
const MOCK_COMPANY: &str = "Mock Industries";

/// GET /health
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "mock-interviewer"
    }))
}

/// POST /api/applications/apply_with_text
pub async fn handle_apply_with_text(
    State(state): State<MockState>,
    Json(req): Json<ApplyRequest>,
) -> Result<Json<ApplyResponse>, ServerError> {
    if req.job_id <= 0 {
        return Err(ServerError::NotFound(format!("Job {} not found", req.job_id)));
    }
    if req.cv.trim().is_empty() {
        return Err(ServerError::Validation("cv must not be empty".to_string()));
    }

    let application_id = state.next_application_id();
    let user_id = req.user_id.unwrap_or(MOCK_APPLICANT_ID);

    Ok(Json(ApplyResponse {
        application_id,
        message: Some(
            "Application submitted successfully. AI interview will start automatically."
                .to_string(),
        ),
        interview_ready: true,
        scoring_completed: false,
        websocket_url: Some(state.chat_url(application_id, user_id)),
    }))
}

/// POST /api/applications/:id/start_interview
pub async fn handle_start_interview(
    State(state): State<MockState>,
    Path(application_id): Path<i64>,
) -> Result<Json<InterviewTicket>, ServerError> {
    if application_id <= 0 {
        return Err(ServerError::NotFound(format!(
            "Application {application_id} not found"
        )));
    }

    Ok(Json(InterviewTicket {
        application_id,
        user_id: Some(MOCK_APPLICANT_ID),
        job_title: Some(MOCK_JOB_TITLE.to_string()),
        company: Some(MOCK_COMPANY.to_string()),
        interview_ready: true,
        websocket_url: Some(state.chat_url(application_id, MOCK_APPLICANT_ID)),
    }))
}
