//! # Claude Agent Control
//!
//! Drive the Claude Code CLI from Rust over its line-delimited JSON control
//! protocol, and serve in-process tools, resources and prompts back to it.
//!
//! One child process carries three things over stdin/stdout:
//! - the ordered stream of conversation [`Message`]s,
//! - a request/response control channel (interrupts, mode and model changes,
//!   file rewind, permission and hook callbacks),
//! - JSON-RPC traffic for in-process MCP servers.
//!
//! ## Quick Start
//!
//! ```no_run
//! use claude_agent_control::{query, Message};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let stream = query("What is 2 + 2?", None).await?;
//!     let mut stream = Box::pin(stream);
//!
//!     while let Some(message) = stream.next().await {
//!         if let Message::Assistant { message, .. } = message? {
//!             println!("Claude: {:?}", message.content);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive Client
//!
//! ```no_run
//! # use claude_agent_control::{ClaudeSDKClient, ClaudeAgentOptions};
//! # use futures::StreamExt;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ClaudeAgentOptions::builder().max_turns(10).build();
//! let client = ClaudeSDKClient::new(options, None).await?;
//! client.query("Hello, Claude!", None).await?;
//!
//! let mut response = Box::pin(client.receive_response());
//! while let Some(message) = response.next().await {
//!     println!("{:?}", message?);
//! }
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Permission Control
//!
//! ```no_run
//! # use claude_agent_control::{ClaudeAgentOptions, PermissionManager, PermissionResult};
//! let permission_callback = PermissionManager::callback(|tool_name, _input, _context| async move {
//!     match tool_name.as_str() {
//!         "Read" | "Glob" => Ok(PermissionResult::allow()),
//!         _ => Ok(PermissionResult::deny("Tool not allowed")),
//!     }
//! });
//!
//! let options = ClaudeAgentOptions::builder()
//!     .can_use_tool(permission_callback)
//!     .build();
//! ```
//!
//! ## Architecture
//!
//! - [`types`]: Options, permission and hook types, the message model
//! - [`message`]: Parsing raw frames into [`Message`]s
//! - [`transport`]: The [`Transport`] trait, JSON line codec and subprocess transport
//! - [`control`]: Control frames and the [`Query`](control::Query) engine
//! - [`mcp`]: In-process MCP servers
//! - [`hooks`]: Hook registry and typed hook inputs
//! - [`permissions`]: Permission callbacks and responses
//! - [`client`]: Interactive client
//! - [`query()`]: One-shot query
//! - [`error`]: Error type
//!
//! ## Logging
//!
//! The crate logs through `tracing`; install any subscriber to see it.
//! CLI stderr lines are logged at `debug`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod control;
pub mod error;
pub mod hooks;
pub mod mcp;
pub mod message;
pub mod permissions;
pub mod query;
pub mod transport;
pub mod types;

pub use client::ClaudeSDKClient;
pub use error::{ClaudeError, Result};
pub use hooks::{HookInput, HookManager, HookMatcherBuilder};
pub use message::parse_message;
pub use permissions::PermissionManager;
pub use query::{query, query_with_cli};
pub use transport::{PromptInput, SubprocessTransport, Transport};
pub use types::{
    AgentDefinition, AssistantMessageContent, AssistantMessageError, CanUseToolCallback,
    ClaudeAgentOptions, ClaudeAgentOptionsBuilder, ContentBlock, ContentValue, HookCallback,
    HookContext, HookDecision, HookEvent, HookMatcher, HookOutput, McpHttpServerConfig,
    McpServerConfig, McpServers, McpSseServerConfig, McpStdioServerConfig, Message,
    PermissionBehavior, PermissionMode, PermissionResult, PermissionResultAllow,
    PermissionResultDeny, PermissionRuleValue, PermissionUpdate, PermissionUpdateDestination,
    RequestId, SessionId, SettingSource, StderrCallback, SystemPrompt, SystemPromptPreset,
    ToolName, ToolPermissionContext, UserContent, UserMessageContent,
};

/// Version of the crate, reported to the CLI as `CLAUDE_AGENT_SDK_VERSION`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
