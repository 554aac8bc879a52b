//! Scripted interviewer backend for local runs and end-to-end tests.
//!
//! Speaks the same wire protocol as the real screening service but asks a
//! fixed list of questions instead of generating them.

pub mod handlers;
pub mod interview;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::MockConfig;
use crate::endpoint::CHAT_PATH;

/// Shared state injected into the mock's handlers.
#[derive(Clone)]
pub struct MockState {
    pub config: Arc<MockConfig>,
    next_application_id: Arc<AtomicI64>,
}

impl MockState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(config),
            next_application_id: Arc::new(AtomicI64::new(1)),
        }
    }

    pub fn next_application_id(&self) -> i64 {
        self.next_application_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Chat URL handed out by the REST endpoints, as the real backend does.
    pub fn chat_url(&self, application_id: i64, user_id: i64) -> String {
        format!(
            "ws://{}{CHAT_PATH}?applicationId={application_id}&userId={user_id}",
            self.config.public_host
        )
    }
}

pub fn build_router(state: MockState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(CHAT_PATH, get(interview::handle_chat_socket))
        .route(
            "/api/applications/apply_with_text",
            post(handlers::handle_apply_with_text),
        )
        .route(
            "/api/applications/:id/start_interview",
            post(handlers::handle_start_interview),
        )
        .with_state(state)
}

pub async fn serve(config: MockConfig) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!(
        "Mock interviewer with {} scripted question(s)",
        config.questions.len()
    );

    let app = build_router(MockState::new(config))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
