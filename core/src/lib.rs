// Creditgate Core Library
// Payment-gated generation tools exposed to agent clients

pub mod access_broker;
pub mod generation;
pub mod materializer;
pub mod mcp;
pub mod payments;
pub mod tools;

// Export core types
pub use access_broker::{
    AccessBroker, AccessGrant, AccessOptions, BalanceSnapshot, PurchaseOutcome,
};
pub use generation::{
    GenerationClient, GenerationConfig, GenerationEndpoints, GenerationRequest, GenerationResult,
    RetryPolicy,
};
pub use materializer::{
    ContentMaterializer, MaterializedContent, MaterializerConfig, INLINE_LIMIT_BYTES,
};
pub use mcp::{CallToolResult, ToolContent};
pub use payments::{
    Credits, HttpPaymentService, OrderOutcome, PaymentEnvironment, PaymentService,
    PaymentsConfig,
};
pub use tools::{
    register_generation_tools, Tool, ToolError, ToolOrchestrator, ToolRegistry, ToolResult,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Payment service error: {0}")]
    Payment(String),

    #[error("Access grant error: {0}")]
    Access(String),

    #[error("Materialization error: {0}")]
    Materialize(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
pub type Result<T> = std::result::Result<T, GateError>;
