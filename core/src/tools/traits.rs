use super::error::ToolResult;
use crate::mcp::{CallToolResult, McpTool};
use async_trait::async_trait;
use serde_json::Value;

/// The core trait for all exposed tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "text2image")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// The JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn call(&self, arguments: Value) -> ToolResult<CallToolResult>;

    /// Definition advertised through tools/list
    fn definition(&self) -> McpTool {
        McpTool {
            name: self.name(),
            description: Some(self.description()),
            input_schema: self.parameters(),
        }
    }
}
