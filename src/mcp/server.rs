//! SDK MCP Server Implementation
//!
//! Hosts tools, resources and prompts in-process and answers JSON-RPC requests
//! routed to it by the control engine.

use futures::FutureExt;
use serde_json::{json, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;

use super::prompt::{PromptInfo, PromptResult, SdkMcpPrompt};
use super::protocol::{JsonRpcRequest, JsonRpcResponse, McpError};
use super::resource::{ResourceContents, ResourceInfo, SdkMcpResource};
use super::tool::{SdkMcpTool, ToolInfo, ToolResult};
use crate::error::{panic_message, ClaudeError, Result};

/// MCP protocol revision reported by `initialize`
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// An in-process MCP server
///
/// Registries are fixed once the server is built; share it as
/// `Arc<SdkMcpServer>` (see [`McpServerConfig::Sdk`](crate::types::McpServerConfig::Sdk)).
///
/// # Example
///
/// ```rust
/// use claude_agent_control::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
/// use serde_json::json;
///
/// # async fn example() {
/// let server = SdkMcpServer::new("calculator")
///     .version("1.0.0")
///     .tool(SdkMcpTool::new(
///         "add",
///         "Add two numbers",
///         json!({"a": "number", "b": "number"}),
///         |input| async move {
///             let sum = input["a"].as_f64().unwrap_or(0.0) + input["b"].as_f64().unwrap_or(0.0);
///             Ok(ToolResult::text(format!("Sum: {sum}")))
///         },
///     ));
///
/// let reply = server
///     .handle_message(json!({
///         "jsonrpc": "2.0",
///         "id": 1,
///         "method": "tools/call",
///         "params": {"name": "add", "arguments": {"a": 1, "b": 2}}
///     }))
///     .await;
/// assert_eq!(reply["result"]["content"][0]["text"], "Sum: 3");
/// # }
/// ```
pub struct SdkMcpServer {
    name: String,
    version: String,
    tools: Vec<SdkMcpTool>,
    resources: Vec<SdkMcpResource>,
    prompts: Vec<SdkMcpPrompt>,
}

impl SdkMcpServer {
    /// Create a new MCP server with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
        }
    }

    /// Set the server version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Register a tool with the server
    ///
    /// A tool with the same name replaces the earlier one in place.
    pub fn tool(mut self, tool: SdkMcpTool) -> Self {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(existing) => {
                tracing::warn!(server = %self.name, tool = %tool.name(), "Replacing duplicate tool");
                *existing = tool;
            }
            None => self.tools.push(tool),
        }
        self
    }

    /// Register multiple tools at once
    pub fn tools(self, tools: Vec<SdkMcpTool>) -> Self {
        tools.into_iter().fold(self, |server, tool| server.tool(tool))
    }

    /// Register a resource; a duplicate URI replaces the earlier one in place
    pub fn resource(mut self, resource: SdkMcpResource) -> Self {
        match self.resources.iter_mut().find(|r| r.uri() == resource.uri()) {
            Some(existing) => {
                tracing::warn!(server = %self.name, uri = %resource.uri(), "Replacing duplicate resource");
                *existing = resource;
            }
            None => self.resources.push(resource),
        }
        self
    }

    /// Register a prompt; a duplicate name replaces the earlier one in place
    pub fn prompt(mut self, prompt: SdkMcpPrompt) -> Self {
        match self.prompts.iter_mut().find(|p| p.name() == prompt.name()) {
            Some(existing) => {
                tracing::warn!(server = %self.name, prompt = %prompt.name(), "Replacing duplicate prompt");
                *existing = prompt;
            }
            None => self.prompts.push(prompt),
        }
        self
    }

    /// Get the server name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the server version
    pub fn server_version(&self) -> &str {
        &self.version
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<&SdkMcpTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Metadata of all registered tools, in registration order
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools.iter().map(SdkMcpTool::info).collect()
    }

    /// Invoke a tool by name
    ///
    /// # Errors
    /// `ClaudeError::Mcp` if the tool is unknown or its handler panics; handler
    /// errors are returned unchanged
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let tool = self
            .get_tool(name)
            .ok_or_else(|| ClaudeError::mcp(format!("Tool '{name}' not found")))?;
        guarded(tool.invoke(arguments)).await
    }

    /// Metadata of all registered resources
    pub fn list_resources(&self) -> Vec<ResourceInfo> {
        self.resources.iter().map(SdkMcpResource::info).collect()
    }

    /// Read a resource by URI
    ///
    /// # Errors
    /// Same contract as [`call_tool`](Self::call_tool)
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        let resource = self
            .resources
            .iter()
            .find(|r| r.uri() == uri)
            .ok_or_else(|| ClaudeError::mcp(format!("Resource '{uri}' not found")))?;
        guarded(resource.read()).await
    }

    /// Metadata of all registered prompts
    pub fn list_prompts(&self) -> Vec<PromptInfo> {
        self.prompts.iter().map(SdkMcpPrompt::info).collect()
    }

    /// Render a prompt by name
    ///
    /// # Errors
    /// Same contract as [`call_tool`](Self::call_tool)
    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<PromptResult> {
        let prompt = self
            .prompts
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| ClaudeError::mcp(format!("Prompt '{name}' not found")))?;
        guarded(prompt.render(arguments)).await
    }

    fn capabilities(&self) -> Value {
        let mut caps = serde_json::Map::new();
        if !self.tools.is_empty() {
            caps.insert("tools".into(), json!({}));
        }
        if !self.resources.is_empty() {
            caps.insert("resources".into(), json!({}));
        }
        if !self.prompts.is_empty() {
            caps.insert("prompts".into(), json!({}));
        }
        Value::Object(caps)
    }

    /// Handle a raw JSON-RPC message, always producing a response value
    ///
    /// The envelope is read leniently: only `method` is required, and a message
    /// without one is answered with `-32601`.
    pub async fn handle_message(&self, message: Value) -> Value {
        match JsonRpcRequest::from_value(&message) {
            Some(request) => self.handle_request(request).await.into_value(),
            None => {
                let id = message.get("id").cloned().unwrap_or(Value::Null);
                JsonRpcResponse::error(id, McpError::unresolved("Missing method"))
                    .into_value()
            }
        }
    }

    /// Handle an MCP JSON-RPC request
    ///
    /// Never fails: unknown methods and names map to `-32601`, handler errors and
    /// panics to `-32603`.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);
        tracing::debug!(server = %self.name, method = %request.method, "Handling MCP request");

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": self.capabilities(),
                    "serverInfo": {
                        "name": self.name,
                        "version": self.version,
                    },
                }),
            ),
            "notifications/initialized" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": self.list_tools() })),
            "tools/call" => {
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::error(id, McpError::unresolved("Missing tool name"));
                };
                let Some(tool) = self.get_tool(name) else {
                    return JsonRpcResponse::error(id, McpError::not_found("Tool", name));
                };
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                respond(id, guarded(tool.invoke(arguments)).await)
            }
            "resources/list" => {
                JsonRpcResponse::success(id, json!({ "resources": self.list_resources() }))
            }
            "resources/read" => {
                let Some(uri) = params.get("uri").and_then(Value::as_str) else {
                    return JsonRpcResponse::error(id, McpError::unresolved("Missing resource uri"));
                };
                let Some(resource) = self.resources.iter().find(|r| r.uri() == uri) else {
                    return JsonRpcResponse::error(id, McpError::not_found("Resource", uri));
                };
                respond(id, guarded(resource.read()).await)
            }
            "prompts/list" => {
                JsonRpcResponse::success(id, json!({ "prompts": self.list_prompts() }))
            }
            "prompts/get" => {
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::error(id, McpError::unresolved("Missing prompt name"));
                };
                let Some(prompt) = self.prompts.iter().find(|p| p.name() == name) else {
                    return JsonRpcResponse::error(id, McpError::not_found("Prompt", name));
                };
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
                respond(id, guarded(prompt.render(arguments)).await)
            }
            other => JsonRpcResponse::error(id, McpError::method_not_found(other)),
        }
    }
}

/// Await a handler future, turning a panic into an error
async fn guarded<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ClaudeError::mcp(format!(
            "Handler panicked: {}",
            panic_message(&*payload)
        ))),
    }
}

fn respond<T: serde::Serialize>(id: Value, outcome: Result<T>) -> JsonRpcResponse {
    match outcome.and_then(|value| serde_json::to_value(value).map_err(ClaudeError::from)) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => {
            tracing::debug!(error = %e, "MCP handler failed");
            JsonRpcResponse::error(id, McpError::internal_error(e.to_string()))
        }
    }
}

impl std::fmt::Debug for SdkMcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpServer")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("prompts", &self.prompts.len())
            .finish()
    }
}
