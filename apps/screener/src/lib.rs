//! Applicant-side client for the realtime screening interview, plus a scripted
//! interviewer to run it against.

pub mod api_client;
pub mod codec;
pub mod config;
pub mod driver;
pub mod endpoint;
pub mod errors;
pub mod mock_server;
pub mod models;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod ui;
