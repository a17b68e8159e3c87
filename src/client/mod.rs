//! ClaudeSDKClient for bidirectional communication
//!
//! This module provides the client for interactive, stateful conversations
//! with Claude Code, including support for:
//! - Follow-up turns in one session
//! - Interrupts, permission mode and model changes, file rewind
//! - Hook, permission and in-process MCP callbacks
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ClaudeSDKClient                      │
//! │                                                          │
//! │                 ┌────────────────────┐                   │
//! │                 │       Query        │                   │
//! │                 │                    │                   │
//! │  user turns ───→│  write (per-write  │──→ stdin          │
//! │  control ops ──→│  transport lock)   │                   │
//! │                 │                    │                   │
//! │  messages  ←────│  read loop         │←── stdout         │
//! │                 │   • responses      │                   │
//! │                 │   • handler tasks ─┼──→ control_resp.  │
//! │                 └────────────────────┘                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The read loop takes the transport's receiver once and never holds the
//! transport lock while reading, so writes are never blocked by reads.
//!
//! # Example: Basic Usage
//!
//! ```no_run
//! use claude_agent_control::{ClaudeSDKClient, ClaudeAgentOptions, Message};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClaudeSDKClient::new(ClaudeAgentOptions::default(), None).await?;
//!
//! client.query("Hello, Claude!", None).await?;
//!
//! let mut response = Box::pin(client.receive_response());
//! while let Some(message) = response.next().await {
//!     if let Message::Assistant { message, .. } = message? {
//!         println!("Response: {:?}", message.content);
//!     }
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Interrupt
//!
//! ```no_run
//! use claude_agent_control::{ClaudeSDKClient, ClaudeAgentOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClaudeSDKClient::new(ClaudeAgentOptions::default(), None).await?;
//!
//! client.query("Write a long essay", None).await?;
//!
//! tokio::time::sleep(std::time::Duration::from_millis(500)).await;
//! client.interrupt().await?;
//! # Ok(())
//! # }
//! ```

use futures::Stream;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::control::{Query, QueryConfig};
use crate::error::Result;
use crate::transport::subprocess::ENTRYPOINT_CLIENT;
use crate::transport::{PromptInput, SubprocessTransport};
use crate::types::{ClaudeAgentOptions, Message, PermissionMode, SessionId};
use crate::Transport;

const DEFAULT_SESSION: &str = "default";

/// Client for bidirectional communication with Claude Code
///
/// The connection is established in [`ClaudeSDKClient::new`]; the client is
/// ready for [`query`](ClaudeSDKClient::query) as soon as it is returned.
pub struct ClaudeSDKClient {
    query: Query,
}

impl ClaudeSDKClient {
    /// Connect to the CLI in streaming mode and perform the handshake
    ///
    /// # Arguments
    /// * `options` - Configuration options
    /// * `cli_path` - Optional path to the Claude Code CLI (searched for if None)
    ///
    /// # Errors
    /// - `InvalidConfig` if the options fail validation
    /// - `CliNotFound` / `Connection` if the CLI cannot be started
    /// - `ControlProtocol` / `ControlTimeout` if the handshake fails
    pub async fn new(mut options: ClaudeAgentOptions, cli_path: Option<PathBuf>) -> Result<Self> {
        options.validate()?;

        // Permission prompts are answered over the control channel
        if options.can_use_tool.is_some() {
            options.permission_prompt_tool_name = Some("stdio".to_string());
        }

        let config = QueryConfig::from_options(&options, true);
        let mut transport = SubprocessTransport::new(PromptInput::Stream, options, cli_path)?
            .with_entrypoint(ENTRYPOINT_CLIENT);
        transport.connect().await?;

        Self::with_transport(Box::new(transport), config).await
    }

    /// Build a client over an already connected transport
    ///
    /// Starts the engine and performs the `initialize` handshake.
    pub async fn with_transport(transport: Box<dyn Transport>, config: QueryConfig) -> Result<Self> {
        let query = Query::new(transport, config);
        query.start().await;
        if let Err(e) = query.initialize().await {
            query.close().await;
            return Err(e);
        }
        Ok(Self { query })
    }

    /// Send a user turn
    ///
    /// # Arguments
    /// * `prompt` - Text of the turn
    /// * `session_id` - Session to send it in (`"default"` if None)
    pub async fn query(&self, prompt: impl Into<String>, session_id: Option<SessionId>) -> Result<()> {
        let session_id = session_id.unwrap_or_else(|| SessionId::new(DEFAULT_SESSION));
        let frame = json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": prompt.into(),
            },
            "parent_tool_use_id": null,
            "session_id": session_id,
        });
        self.query.write_frame(&frame).await
    }

    /// Send a pre-built user frame
    pub async fn send_frame(&self, frame: &Value) -> Result<()> {
        self.query.write_frame(frame).await
    }

    /// All messages until the stream ends
    pub fn receive_messages(&self) -> impl Stream<Item = Result<Message>> + Send + 'static {
        self.query.receive_messages()
    }

    /// Messages up to and including the next `Result` message
    pub fn receive_response(&self) -> impl Stream<Item = Result<Message>> + Send + 'static {
        let messages = self.query.receive_messages();
        async_stream::stream! {
            futures::pin_mut!(messages);
            while let Some(message) = futures::StreamExt::next(&mut messages).await {
                let done = matches!(message, Ok(ref m) if m.is_result());
                yield message;
                if done {
                    break;
                }
            }
        }
    }

    /// Stop the current turn
    pub async fn interrupt(&self) -> Result<()> {
        self.query.interrupt().await
    }

    /// Change the permission mode for the rest of the session
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.query.set_permission_mode(mode).await
    }

    /// Switch model; `None` restores the default
    pub async fn set_model(&self, model: Option<String>) -> Result<()> {
        self.query.set_model(model).await
    }

    /// Restore files to their state at a user message
    ///
    /// Requires `enable_file_checkpointing`; `user_message_id` is the `uuid` of
    /// a [`Message::User`].
    pub async fn rewind_files(&self, user_message_id: impl Into<String>) -> Result<()> {
        self.query.rewind_files(user_message_id).await
    }

    /// Reply to the `initialize` handshake (commands, output styles, ...)
    pub fn server_info(&self) -> Option<Value> {
        self.query.server_info()
    }

    /// Close stdin, signalling that no more turns follow
    pub async fn end_input(&self) -> Result<()> {
        self.query.end_input().await
    }

    /// Disconnect and shut the CLI down
    pub async fn close(&self) {
        self.query.close().await;
    }
}
