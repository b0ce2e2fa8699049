//! `haksa serve` — Start the HTTP chat service.

use haksa_config::AppConfig;
use tracing::info;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config.validate()?;

    info!(
        host = %config.gateway.host,
        port = config.gateway.port,
        session_backend = %config.session.backend,
        "Starting haksa"
    );

    haksa_gateway::start(config).await
}
