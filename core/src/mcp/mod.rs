/// Model Context Protocol (MCP) wire types
///
/// Creditgate exposes its tools as an MCP server; this module holds the
/// JSON-RPC envelope and the initialize / tools/list / tools/call shapes.
/// The transport loop lives in the bridge crate.
///
/// MCP Protocol Spec: https://spec.modelcontextprotocol.io/specification/
pub mod types;

pub use types::{
    negotiate_protocol_version, CallToolParams, CallToolResult, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool,
    ResourceContents, ServerCapabilities, ServerInfo, ToolContent, ToolsCapability,
    LATEST_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
