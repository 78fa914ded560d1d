//! MCP server over newline-delimited JSON-RPC.
//!
//! One reader loop parses frames; `tools/call` requests run as their own
//! tasks and every response goes through a single writer task, so frames
//! never interleave on the output stream.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use creditgate_core::mcp::{
    negotiate_protocol_version, CallToolParams, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo,
    ToolsCapability, LATEST_PROTOCOL_VERSION,
};
use creditgate_core::ToolRegistry;

const RESPONSE_QUEUE: usize = 64;

const INSTRUCTIONS: &str = "Paid media generation. text2image, image2image and text2video \
consume plan credits; when a result reports needsPurchase, call purchase_plan with the \
given planDid and retry.";

pub struct McpServer {
    registry: ToolRegistry,
    server_info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, name: impl Into<String>) -> Self {
        Self {
            registry,
            server_info: ServerInfo {
                name: name.into(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Serve until `reader` hits EOF, then flush in-flight responses.
    /// Stops reading early once the writer fails and returns its error.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_QUEUE);
        let writer_task = tokio::spawn(write_responses(writer, rx));

        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            if tx.is_closed() {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let request = match parse_frame(&line) {
                Ok(request) => request,
                Err(response) => {
                    if tx.send(*response).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            if request.method == "tools/call" {
                let server = Arc::clone(&self);
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = server.handle_request(request).await {
                        if tx.send(response).await.is_err() {
                            warn!(target: "mcp_server", "Output closed; dropping tool result");
                        }
                    }
                });
            } else if let Some(response) = self.handle_request(request).await {
                if tx.send(response).await.is_err() {
                    break;
                }
            }
        }

        if tx.is_closed() {
            error!(target: "mcp_server", "Output closed; no longer reading requests");
        } else {
            info!(target: "mcp_server", "Input closed; draining in-flight calls");
        }
        drop(tx);
        writer_task
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }

    /// Dispatch one request; notifications yield `None`
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!(target: "mcp_server", method = %request.method, "Notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => {
                warn!(target: "mcp_server", method = %other, "Unknown method");
                Err(JsonRpcError::new(
                    JsonRpcError::METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                ))
            }
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(err) => JsonRpcResponse::failure(id, err),
        })
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let requested = match params {
            Some(params) => {
                let params: InitializeParams = serde_json::from_value(params).map_err(|e| {
                    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, format!("Invalid params: {}", e))
                })?;
                if let Some(client) = &params.client_info {
                    info!(target: "mcp_server", client = %client.name, version = %client.version, "Client connected");
                }
                params.protocol_version
            }
            None => LATEST_PROTOCOL_VERSION.to_string(),
        };

        let result = InitializeResult {
            protocol_version: negotiate_protocol_version(&requested).to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                experimental: None,
            },
            server_info: self.server_info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        to_result(&result)
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListToolsResult {
            tools: self.registry.definitions(),
            next_cursor: None,
        })
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::new(JsonRpcError::INVALID_PARAMS, "Missing params"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| {
                    JsonRpcError::new(JsonRpcError::INVALID_PARAMS, format!("Invalid params: {}", e))
                })
            })?;

        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let result = self
            .registry
            .call(&params.name, arguments)
            .await
            .map_err(JsonRpcError::from)?;
        to_result(&result)
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(JsonRpcError::INTERNAL_ERROR, e.to_string()))
}

/// Decode one frame, or the error response owed for it
fn parse_frame(line: &str) -> Result<JsonRpcRequest, Box<JsonRpcResponse>> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        warn!(target: "mcp_server", error = %e, "Unparsable frame");
        Box::new(JsonRpcResponse::failure(
            Value::Null,
            JsonRpcError::new(JsonRpcError::PARSE_ERROR, format!("Parse error: {}", e)),
        ))
    })?;

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
        Box::new(JsonRpcResponse::failure(
            id.clone(),
            JsonRpcError::new(JsonRpcError::INVALID_REQUEST, format!("Invalid request: {}", e)),
        ))
    })?;

    if request.jsonrpc != "2.0" {
        return Err(Box::new(JsonRpcResponse::failure(
            id,
            JsonRpcError::new(JsonRpcError::INVALID_REQUEST, "jsonrpc must be \"2.0\""),
        )));
    }
    Ok(request)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<JsonRpcResponse>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut frame = match serde_json::to_vec(&response) {
            Ok(frame) => frame,
            Err(e) => {
                error!(target: "mcp_server", error = %e, "Failed to serialize response");
                continue;
            }
        };
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    debug!(target: "mcp_server", "Writer exited");
    Ok(())
}
