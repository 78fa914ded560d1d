use tracing_subscriber::{fmt, EnvFilter};

use creditgate_bridge::{build_server, serve_stdio, BridgeConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // stdout carries protocol frames only
    fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BridgeConfig::load();
    tracing::info!(
        environment = %config.payments.environment,
        payments = %config.payments.resolved_base_url(),
        "Starting creditgate bridge"
    );

    let server = build_server(&config).await.map_err(|e| {
        tracing::error!("Bridge startup failed: {}", e);
        e
    })?;

    serve_stdio(server).await?;
    tracing::info!("Bridge stopped");
    Ok(())
}
