use super::error::{ToolError, ToolResult};
use super::traits::Tool;
use crate::mcp::{CallToolResult, McpTool};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A registry for managing available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound every call by `limit`; generation calls are unbounded otherwise
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    /// Register a new tool
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");

        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(target: "tool_registry", tool = %name, "Replaced previously registered tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    /// List all registered tools, ordered by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.iter().map(|t| t.clone()).collect();
        tools.sort_by_key(|t| t.name());
        tools
    }

    pub fn definitions(&self) -> Vec<McpTool> {
        self.list_tools().iter().map(|t| t.definition()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Call a tool by name
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolResult<CallToolResult> {
        let start_time = Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let fut = tool.call(arguments);
        let result = match self.call_timeout {
            Some(limit) => match timeout(limit, fut).await {
                Ok(res) => res,
                Err(_) => {
                    warn!(target: "tool_registry", tool = %name, "Tool execution timed out");
                    Err(ToolError::Timeout)
                }
            },
            None => fut.await,
        };

        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(output) => {
                info!(
                    target: "tool_registry",
                    tool = %name,
                    is_error = output.is_error,
                    elapsed_ms,
                    "Tool call completed"
                );
            }
            Err(e) => {
                warn!(
                    target: "tool_registry",
                    tool = %name,
                    error = %e,
                    code = e.code(),
                    elapsed_ms,
                    "Tool execution failed"
                );
            }
        }

        result
    }
}
