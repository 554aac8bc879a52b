use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use screener::api_client::{source_for, ApiClient};
use screener::config::Config;
use screener::driver::spawn_session;
use screener::endpoint::EndpointPolicy;
use screener::telemetry;
use screener::transport::WsConnector;
use screener::ui;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    telemetry::init(&config.rust_log);

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    let api = ApiClient::new(config.api_base.clone())?;
    let source = source_for(&config);
    info!("Loading chat context via {}", source.name());
    let context = source
        .load(&api)
        .await
        .context("Could not prepare the screening chat")?;

    let policy = EndpointPolicy::from_config(&config);
    let (handle, task) = spawn_session(context, Arc::new(WsConnector), policy);

    ui::run_terminal(handle).await?;

    let session = task.await?;
    if session.is_ended() {
        info!("Screening complete");
    } else {
        info!("Chat closed before the interviewer finished");
    }

    Ok(())
}
