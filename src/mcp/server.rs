//! MCP request dispatch shared by the stdio and HTTP transports.

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION};
use super::resources::{self, RESOURCES, TEMPLATES};
use super::tools::{self, ToolOutput};
use crate::api::AmplitudeClient;
use crate::error::Result;

pub const SERVER_NAME: &str = "amplitude-mcp";

pub struct McpServer {
    client: AmplitudeClient,
}

impl McpServer {
    pub fn new(client: AmplitudeClient) -> Self {
        Self { client }
    }

    /// Handle one line of the stdio transport. `None` means nothing is written back.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    JsonRpcError::parse_error(e),
                ))
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request(e))),
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        // Notifications don't get responses
        if request.is_notification() {
            debug!(method = %request.method, "notification");
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);

        let result = match request.method.as_str() {
            "initialize" => Ok(server_info(&params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call_tool(&params).await,
            "resources/list" => Ok(json!({
                "resources": RESOURCES
                    .iter()
                    .map(|r| r.resource_definition())
                    .collect::<Vec<_>>()
            })),
            "resources/templates/list" => Ok(json!({
                "resourceTemplates": TEMPLATES
                    .iter()
                    .map(|r| r.template_definition())
                    .collect::<Vec<_>>()
            })),
            "resources/read" => self.read_resource(&params).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match result {
            Ok(r) => JsonRpcResponse::success(id, r),
            Err(e) => JsonRpcResponse::error(id, e),
        })
    }

    async fn call_tool(&self, params: &Value) -> std::result::Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?;
        let tool = tools::find(name)
            .ok_or_else(|| JsonRpcError::invalid_params(format!("Unknown tool: {}", name)))?;
        let args = params.get("arguments").cloned().unwrap_or(Value::Null);

        Ok(tool_result(tool.call(&self.client, &args).await))
    }

    async fn read_resource(&self, params: &Value) -> std::result::Result<Value, JsonRpcError> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("Missing resource uri"))?;

        let output = match resources::resolve(uri) {
            Ok((tool_name, args)) => match tools::find(tool_name) {
                Some(tool) => tool.call(&self.client, &args).await,
                None => {
                    return Err(JsonRpcError::internal_error(format!(
                        "No tool for resource: {}",
                        uri
                    )))
                }
            },
            Err(e) => Err(e),
        };

        match output {
            Ok(output) => Ok(json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "application/json",
                    "text": pretty(&output.data)
                }]
            })),
            Err(e) if e.is_validation() => Err(JsonRpcError::invalid_params(e.to_string())),
            Err(e) => {
                warn!(uri, error = %e, "resource read failed");
                Err(JsonRpcError::internal_error(e.to_string()))
            }
        }
    }
}

fn server_info(params: &Value) -> Value {
    let version = params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or(PROTOCOL_VERSION);
    json!({
        "protocolVersion": version,
        "capabilities": {
            "tools": {},
            "resources": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn tool_definitions() -> Vec<Value> {
    tools::tools().iter().map(|t| t.definition()).collect()
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// The one envelope rule for every tool: summary + JSON on success, the
/// error message with `isError` on failure.
pub fn tool_result(result: Result<ToolOutput>) -> Value {
    match result {
        Ok(output) => json!({
            "content": [
                { "type": "text", "text": output.summary },
                { "type": "text", "text": pretty(&output.data) }
            ]
        }),
        Err(e) => json!({
            "content": [{
                "type": "text",
                "text": format!("Error: {}", e)
            }],
            "isError": true
        }),
    }
}
