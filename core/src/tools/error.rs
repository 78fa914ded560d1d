use crate::mcp::JsonRpcError;
use crate::GateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Access denied: {0}")]
    Unauthorized(String),

    #[error("Content unavailable: {0}")]
    Materialization(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Convert to error code string
    pub fn code(&self) -> &'static str {
        match self {
            ToolError::NotFound(_) => "TOOL_NOT_FOUND",
            ToolError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            ToolError::Unauthorized(_) => "UNAUTHORIZED",
            ToolError::Materialization(_) => "MATERIALIZATION_FAILED",
            ToolError::ExecutionFailed(_) => "EXECUTION_FAILED",
            ToolError::Timeout => "TIMEOUT",
            ToolError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// JSON-RPC error code used when the error crosses the protocol boundary
    pub fn rpc_code(&self) -> i32 {
        match self {
            ToolError::NotFound(_) | ToolError::InvalidArguments(_) => {
                JsonRpcError::INVALID_PARAMS
            }
            _ => JsonRpcError::INTERNAL_ERROR,
        }
    }
}

impl From<GateError> for ToolError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Access(msg) => ToolError::Unauthorized(msg),
            GateError::Materialize(msg) => ToolError::Materialization(msg),
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

impl From<ToolError> for JsonRpcError {
    fn from(err: ToolError) -> Self {
        let mut rpc = JsonRpcError::new(err.rpc_code(), err.to_string());
        rpc.data = Some(serde_json::json!({ "code": err.code() }));
        rpc
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
