use anyhow::Result;

use screener::config::MockConfig;
use screener::{mock_server, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = MockConfig::from_env()?;
    telemetry::init(&config.rust_log);
    mock_server::serve(config).await
}
