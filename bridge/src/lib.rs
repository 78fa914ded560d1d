pub mod config;
pub mod server;

use std::sync::Arc;

use creditgate_core::{
    register_generation_tools, AccessBroker, ContentMaterializer, GateError, HttpPaymentService,
    PaymentService, ToolOrchestrator, ToolRegistry,
};
use tracing::info;

pub use config::{BridgeConfig, DEFAULT_AGENT_DID, DEFAULT_PLAN_DID};
pub use server::McpServer;

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("startup failed: {0}")]
    Startup(#[from] GateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Wire the payment client, broker, materializer and tools from `config`
pub async fn build_registry(config: &BridgeConfig) -> Result<ToolRegistry> {
    let payments: Arc<dyn PaymentService> =
        Arc::new(HttpPaymentService::new(config.payments.clone())?);
    build_registry_with(payments, config).await
}

/// Same as [`build_registry`] over an already constructed payment service
pub async fn build_registry_with(
    payments: Arc<dyn PaymentService>,
    config: &BridgeConfig,
) -> Result<ToolRegistry> {
    let broker = Arc::new(AccessBroker::with_options(
        payments,
        config.access.clone(),
        config.generation.clone(),
    ));
    let orchestrator = Arc::new(ToolOrchestrator::new(
        broker,
        ContentMaterializer::with_config(config.materializer.clone())?,
        config.plan_did.clone(),
        config.agent_did.clone(),
    ));

    let registry = match config.call_timeout {
        Some(limit) => ToolRegistry::new().with_timeout(limit),
        None => ToolRegistry::new(),
    };
    register_generation_tools(&registry, orchestrator).await;

    info!(
        target: "bridge",
        tools = registry.len(),
        plan = %config.plan_did,
        agent = %config.agent_did,
        "Tool registry ready"
    );
    Ok(registry)
}

/// Build the MCP server for `config`
pub async fn build_server(config: &BridgeConfig) -> Result<McpServer> {
    let registry = build_registry(config).await?;
    Ok(McpServer::new(registry, config.server_name.clone()))
}

/// Serve MCP on stdin/stdout until stdin closes
pub async fn serve_stdio(server: McpServer) -> Result<()> {
    Arc::new(server)
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await?;
    Ok(())
}
