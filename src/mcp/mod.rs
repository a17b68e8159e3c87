//! SDK MCP Server Integration
//!
//! This module provides in-process MCP (Model Context Protocol) server support.
//! Tools, resources and prompts registered on an [`SdkMcpServer`] are served to
//! the CLI through `mcp_message` control requests, without spawning anything.
//!
//! # Quick Start
//!
//! ```rust
//! use claude_agent_control::mcp::{SdkMcpServer, SdkMcpTool, ToolResult};
//! use serde_json::json;
//!
//! let greet_tool = SdkMcpTool::new(
//!     "greet",
//!     "Greet a user by name",
//!     json!({"name": "string"}),
//!     |input| async move {
//!         let name = input["name"].as_str().unwrap_or("stranger");
//!         Ok(ToolResult::text(format!("Hello, {name}!")))
//!     },
//! );
//!
//! let server = SdkMcpServer::new("my-tools")
//!     .version("1.0.0")
//!     .tool(greet_tool);
//! assert_eq!(server.list_tools().len(), 1);
//! ```
//!
//! # MCP Protocol
//!
//! The server answers these JSON-RPC methods:
//! - `initialize`
//! - `tools/list`, `tools/call`
//! - `resources/list`, `resources/read`
//! - `prompts/list`, `prompts/get`
//! - `notifications/initialized`
//!
//! Unknown methods and names get `-32601`; handler failures and panics get `-32603`.
//!
//! # Integration with Claude
//!
//! ```rust,ignore
//! use claude_agent_control::{ClaudeAgentOptions, query};
//! use claude_agent_control::mcp::SdkMcpServer;
//!
//! let options = ClaudeAgentOptions::builder()
//!     .sdk_mcp_server(SdkMcpServer::new("my-tools").tool(/* ... */))
//!     .add_allowed_tool("mcp__my-tools__greet")
//!     .build();
//! ```

mod prompt;
pub mod protocol;
mod resource;
mod server;
mod tool;

pub use prompt::{PromptArgument, PromptInfo, PromptMessage, PromptResult, SdkMcpPrompt};
pub use protocol::{JsonRpcRequest, JsonRpcResponse, McpError};
pub use resource::{ResourceContent, ResourceContents, ResourceInfo, SdkMcpResource};
pub use server::{SdkMcpServer, MCP_PROTOCOL_VERSION};
pub use tool::{SdkMcpTool, ToolContent, ToolInfo, ToolResult};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Async tool handler: receives the call arguments
pub type ToolHandler = Arc<dyn Fn(serde_json::Value) -> BoxFuture<ToolResult> + Send + Sync>;

/// Async resource reader: receives the requested URI
pub type ResourceReader = Arc<dyn Fn(String) -> BoxFuture<ResourceContents> + Send + Sync>;

/// Async prompt generator: receives the prompt arguments
pub type PromptGenerator = Arc<dyn Fn(serde_json::Value) -> BoxFuture<PromptResult> + Send + Sync>;
