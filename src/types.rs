//! Type definitions for the SDK
//!
//! This module contains the type definitions used throughout the crate:
//! newtypes for type safety, the conversation message model, permission and
//! hook types, MCP server configuration and the session options.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{ClaudeError, Result};
use crate::hooks::HookInput;
use crate::mcp::SdkMcpServer;

/// Upper bound accepted for [`ClaudeAgentOptions::max_turns`]
pub const MAX_ALLOWED_TURNS: u32 = 1000;

// ============================================================================
// Identifiers
// ============================================================================

/// Conversation session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a session id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self("default".to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tool name newtype
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolName(String);

impl ToolName {
    /// Wrap a tool name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ToolName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ToolName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Request ID newtype for the control protocol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wrap a request id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// How the CLI treats tools that need approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Prompt for anything risky
    Default,
    /// Accept edits without asking
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Never prompt
    BypassPermissions,
}

impl PermissionMode {
    /// Wire / command-line spelling of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Plan => "plan",
            PermissionMode::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Setting source types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingSource {
    /// User-level settings
    User,
    /// `.claude/settings.json`
    Project,
    /// Local settings
    Local,
}

impl SettingSource {
    /// Command-line spelling of the source
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingSource::User => "user",
            SettingSource::Project => "project",
            SettingSource::Local => "local",
        }
    }
}

/// Settings layer a permission change is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionUpdateDestination {
    /// Save to user settings
    UserSettings,
    /// `.claude/settings.json`
    ProjectSettings,
    /// `.claude/settings.local.json`
    LocalSettings,
    /// Current session only
    Session,
}

/// Permission behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionBehavior {
    /// Allow the action
    Allow,
    /// Deny the action
    Deny,
    /// Ask the user
    Ask,
}

/// Permission rule value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRuleValue {
    /// Name of the tool
    pub tool_name: String,
    /// Optional rule content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_content: Option<String>,
}

/// Change to the permission rules, as suggested by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PermissionUpdate {
    /// Add permission rules
    AddRules {
        /// Rules to add
        #[serde(skip_serializing_if = "Option::is_none")]
        rules: Option<Vec<PermissionRuleValue>>,
        /// Behavior the rules grant
        #[serde(skip_serializing_if = "Option::is_none")]
        behavior: Option<PermissionBehavior>,
        /// Settings layer receiving the rules
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Overwrite the rule list
    ReplaceRules {
        /// New rules
        #[serde(skip_serializing_if = "Option::is_none")]
        rules: Option<Vec<PermissionRuleValue>>,
        /// Behavior the rules grant
        #[serde(skip_serializing_if = "Option::is_none")]
        behavior: Option<PermissionBehavior>,
        /// Settings layer receiving the rules
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Drop matching rules
    RemoveRules {
        /// Rules to remove
        #[serde(skip_serializing_if = "Option::is_none")]
        rules: Option<Vec<PermissionRuleValue>>,
        /// Behavior of the rules being removed
        #[serde(skip_serializing_if = "Option::is_none")]
        behavior: Option<PermissionBehavior>,
        /// Where to remove from
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Set permission mode
    SetMode {
        /// New permission mode
        mode: PermissionMode,
        /// Settings layer receiving the mode
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Grant directory access
    AddDirectories {
        /// Directories to add
        #[serde(skip_serializing_if = "Option::is_none")]
        directories: Option<Vec<String>>,
        /// Where to save
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
    /// Revoke directory access
    RemoveDirectories {
        /// Directories to remove
        #[serde(skip_serializing_if = "Option::is_none")]
        directories: Option<Vec<String>>,
        /// Where to remove from
        #[serde(skip_serializing_if = "Option::is_none")]
        destination: Option<PermissionUpdateDestination>,
    },
}

/// Context handed to tool permission callbacks
#[derive(Debug, Clone, Default)]
pub struct ToolPermissionContext {
    /// Rule changes the CLI proposes
    pub suggestions: Vec<PermissionUpdate>,
    /// Path that triggered the permission check, when the CLI reports one
    pub blocked_path: Option<String>,
    /// Cancelled when the CLI withdraws the request
    pub signal: CancellationToken,
}

/// Approval, optionally with rewritten input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionResultAllow {
    /// Replacement input; the original is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<serde_json::Value>,
    /// Rule changes to persist alongside the decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_permissions: Option<Vec<PermissionUpdate>>,
}

/// Refusal, optionally stopping the turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionResultDeny {
    /// Reason for denying
    pub message: String,
    /// Also stop the running turn
    #[serde(default)]
    pub interrupt: bool,
}

/// Answer to a `can_use_tool` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PermissionResult {
    /// Allow the tool use
    Allow(PermissionResultAllow),
    /// Deny the tool use
    Deny(PermissionResultDeny),
}

impl PermissionResult {
    /// Allow the tool use with its original input
    pub fn allow() -> Self {
        PermissionResult::Allow(PermissionResultAllow::default())
    }

    /// Deny the tool use without interrupting the conversation
    pub fn deny(message: impl Into<String>) -> Self {
        PermissionResult::Deny(PermissionResultDeny {
            message: message.into(),
            interrupt: false,
        })
    }
}

/// Async permission callback
pub type CanUseToolCallback = Arc<
    dyn Fn(
            ToolName,
            serde_json::Value,
            ToolPermissionContext,
        ) -> Pin<Box<dyn Future<Output = Result<PermissionResult>> + Send>>
        + Send
        + Sync,
>;

// ============================================================================
// Hooks
// ============================================================================

/// Hook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HookEvent {
    /// Before a tool is used
    PreToolUse,
    /// After a tool is used
    PostToolUse,
    /// A prompt was submitted
    UserPromptSubmit,
    /// The agent finished its turn
    Stop,
    /// When a subagent stops
    SubagentStop,
    /// History is about to be compacted
    PreCompact,
}

impl HookEvent {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::Stop => "Stop",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::PreCompact => "PreCompact",
        }
    }
}

/// Hook decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDecision {
    /// Block the action
    Block,
}

/// Hook output
///
/// Field names serialize to the camelCase spelling the CLI expects;
/// `continue_` and `async_` map to the reserved words `continue` and `async`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Whether the agent should keep going after the hook
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_: Option<bool>,
    /// Hide the hook's stdout from the transcript
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppress_output: Option<bool>,
    /// Message shown when `continue_` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    /// `block` stops the action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<HookDecision>,
    /// System message to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Reason fed back to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Event-specific fields (`hookEventName` plus extras)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<serde_json::Value>,
    /// Defer the hook result
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub async_: Option<bool>,
    /// Timeout for a deferred hook, in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_timeout: Option<u64>,
}

/// Passed to every hook callback
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Cancelled when the CLI withdraws the hook request
    pub signal: CancellationToken,
}

/// Hook callback type
pub type HookCallback = Arc<
    dyn Fn(
            HookInput,
            Option<String>,
            HookContext,
        ) -> Pin<Box<dyn Future<Output = Result<HookOutput>> + Send>>
        + Send
        + Sync,
>;

/// Callbacks registered for a tool pattern
#[derive(Clone)]
pub struct HookMatcher {
    /// Tool name or alternation such as `Write|Edit`; `None` matches every tool
    pub matcher: Option<String>,
    /// Callbacks run in order
    pub hooks: Vec<HookCallback>,
    /// Per-matcher timeout in seconds, enforced by the CLI
    pub timeout: Option<u64>,
}

impl std::fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .field("hooks", &format!("[{} callbacks]", self.hooks.len()))
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ============================================================================
// MCP servers
// ============================================================================

/// Server launched as a child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpStdioServerConfig {
    /// Server type (stdio)
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub server_type: Option<String>,
    /// Command to execute
    pub command: String,
    /// Command arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Environment variables
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

/// Server reached over server-sent events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpSseServerConfig {
    /// Server type (sse)
    #[serde(rename = "type")]
    pub server_type: String,
    /// Server URL
    pub url: String,
    /// HTTP headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Server reached over streamable HTTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpHttpServerConfig {
    /// Server type (http)
    #[serde(rename = "type")]
    pub server_type: String,
    /// Server URL
    pub url: String,
    /// HTTP headers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// One MCP server entry
#[derive(Debug, Clone)]
pub enum McpServerConfig {
    /// Child-process server
    Stdio(McpStdioServerConfig),
    /// SSE-based MCP server
    Sse(McpSseServerConfig),
    /// HTTP-based MCP server
    Http(McpHttpServerConfig),
    /// In-process server answered through `mcp_message` control requests
    Sdk(Arc<SdkMcpServer>),
}

/// MCP servers container
#[derive(Debug, Clone, Default)]
pub enum McpServers {
    /// No MCP servers
    #[default]
    None,
    /// Servers by name
    Dict(HashMap<String, McpServerConfig>),
    /// Config file listing servers
    Path(PathBuf),
}

impl McpServers {
    /// In-process servers keyed by the name the CLI will route to
    pub fn sdk_servers(&self) -> HashMap<String, Arc<SdkMcpServer>> {
        match self {
            McpServers::Dict(servers) => servers
                .iter()
                .filter_map(|(name, config)| match config {
                    McpServerConfig::Sdk(server) => Some((name.clone(), server.clone())),
                    _ => None,
                })
                .collect(),
            _ => HashMap::new(),
        }
    }
}

// ============================================================================
// Conversation messages
// ============================================================================

/// `tool_result` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    /// String content
    String(String),
    /// Block list
    Blocks(Vec<serde_json::Value>),
}

/// Content block types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Text content block
    Text {
        /// Text content
        text: String,
    },
    /// Extended thinking
    Thinking {
        /// Thinking content
        thinking: String,
        /// Opaque signature over the thinking text
        signature: String,
    },
    /// Tool use request
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// Tool execution result
    ToolResult {
        /// Matching `tool_use` id
        tool_use_id: String,
        /// Result content
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<ContentValue>,
        /// Set when the tool call failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

fn default_user_role() -> String {
    "user".to_string()
}

/// User message content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMessageContent {
    /// Always `"user"`
    #[serde(default = "default_user_role")]
    pub role: String,
    /// Message content
    pub content: UserContent,
}

/// Body of a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserContent {
    /// Plain string content
    String(String),
    /// Block list
    Blocks(Vec<ContentBlock>),
}

/// Body of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessageContent {
    /// Model id
    pub model: String,
    /// Content
    pub content: Vec<ContentBlock>,
}

/// Failure reported alongside an assistant message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantMessageError {
    /// Credentials were rejected
    AuthenticationFailed,
    /// Account billing problem
    BillingError,
    /// Rate limited by the API
    RateLimit,
    /// The API rejected the request
    InvalidRequest,
    /// The API failed
    ServerError,
    /// Anything else
    #[serde(other)]
    Unknown,
}

/// Message types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// User message
    User {
        /// Message content
        message: UserMessageContent,
        /// Checkpoint identifier usable with `rewind_files`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid: Option<String>,
        /// Tool use that spawned this message, inside subagents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
    },
    /// Assistant message
    Assistant {
        /// Message content
        message: AssistantMessageContent,
        /// Tool use that spawned this message, inside subagents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
        /// Session ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        /// API failure attached to this turn
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<AssistantMessageError>,
    },
    /// System message
    System {
        /// Kind of system notice, e.g. `init`
        subtype: String,
        /// Remaining fields
        #[serde(flatten)]
        data: serde_json::Value,
    },
    /// End-of-turn summary
    Result {
        /// Result subtype
        subtype: String,
        /// Wall time of the turn (ms)
        duration_ms: u64,
        /// Time spent in API calls (ms)
        duration_api_ms: u64,
        /// Set when the turn ended in failure
        is_error: bool,
        /// Turns taken
        num_turns: u32,
        /// Session ID
        session_id: SessionId,
        /// Total cost in USD
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total_cost_usd: Option<f64>,
        /// Token accounting
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<serde_json::Value>,
        /// Result message
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        /// Structured output, when an output schema was requested
        #[serde(default, skip_serializing_if = "Option::is_none")]
        structured_output: Option<serde_json::Value>,
    },
    /// Raw partial-message event
    StreamEvent {
        /// Event UUID
        uuid: String,
        /// Session ID
        session_id: SessionId,
        /// Raw stream event data
        event: serde_json::Value,
        /// Parent tool use ID
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
}

impl Message {
    /// Whether this is the final `result` message of a turn
    pub fn is_result(&self) -> bool {
        matches!(self, Message::Result { .. })
    }
}

// ============================================================================
// System prompt
// ============================================================================

/// System prompt preset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptPreset {
    /// Always `"preset"`
    #[serde(rename = "type")]
    pub prompt_type: String,
    /// Preset to start from, such as `claude_code`
    pub preset: String,
    /// Text appended after the preset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<String>,
}

/// System prompt: literal text or a named preset
#[derive(Debug, Clone)]
pub enum SystemPrompt {
    /// Literal text
    String(String),
    /// Named preset, optionally extended
    Preset(SystemPromptPreset),
}

impl From<String> for SystemPrompt {
    fn from(s: String) -> Self {
        SystemPrompt::String(s)
    }
}

impl From<&str> for SystemPrompt {
    fn from(s: &str) -> Self {
        SystemPrompt::String(s.to_string())
    }
}

impl From<SystemPromptPreset> for SystemPrompt {
    fn from(preset: SystemPromptPreset) -> Self {
        SystemPrompt::Preset(preset)
    }
}

// ============================================================================
// Subagents
// ============================================================================

/// Subagent declared through `--agents`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Agent description
    pub description: String,
    /// Agent system prompt
    pub prompt: String,
    /// Base tool set offered to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<String>>,
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

// ============================================================================
// Session options
// ============================================================================

/// Callback receiving each line the CLI writes to stderr
pub type StderrCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Session options
#[derive(Clone, Default)]
pub struct ClaudeAgentOptions {
    /// Tools usable without prompting
    pub allowed_tools: Vec<ToolName>,
    /// System prompt: literal text or a named preset
    pub system_prompt: Option<SystemPrompt>,
    /// MCP servers to expose
    pub mcp_servers: McpServers,
    /// Initial permission mode
    pub permission_mode: Option<PermissionMode>,
    /// Pick up the most recent conversation
    pub continue_conversation: bool,
    /// Session to resume
    pub resume: Option<SessionId>,
    /// Turn limit
    pub max_turns: Option<u32>,
    /// Tools that are never offered
    pub disallowed_tools: Vec<ToolName>,
    /// AI model to use
    pub model: Option<String>,
    /// MCP tool answering permission prompts (`stdio` routes them to `can_use_tool`)
    pub permission_prompt_tool_name: Option<String>,
    /// Directory the CLI runs in
    pub cwd: Option<PathBuf>,
    /// Path to settings file
    pub settings: Option<PathBuf>,
    /// Extra readable directories
    pub add_dirs: Vec<PathBuf>,
    /// Extra child environment
    pub env: HashMap<String, String>,
    /// Extra flags (allowlisted)
    pub extra_args: HashMap<String, Option<String>>,
    /// Cap on one reassembled stdout frame (1 MiB when unset)
    pub max_buffer_size: Option<usize>,
    /// In-process permission callback
    pub can_use_tool: Option<CanUseToolCallback>,
    /// Hook configurations
    pub hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
    /// Emit `stream_event` messages while a reply is generated
    pub include_partial_messages: bool,
    /// Resume into a new session id instead of appending
    pub fork_session: bool,
    /// Subagents by name
    pub agents: Option<HashMap<String, AgentDefinition>>,
    /// Which settings files the CLI reads
    pub setting_sources: Option<Vec<SettingSource>>,
    /// Receives stderr lines from the CLI
    pub stderr: Option<StderrCallback>,
    /// Track file changes so `rewind_files` can restore them
    pub enable_file_checkpointing: bool,
    /// How long outbound control requests wait for a response (default: 60s)
    pub control_timeout: Option<Duration>,
}

impl ClaudeAgentOptions {
    /// Start building options
    pub fn builder() -> ClaudeAgentOptionsBuilder {
        ClaudeAgentOptionsBuilder::default()
    }

    /// Check bounds and mutually exclusive settings
    ///
    /// # Errors
    /// Returns [`ClaudeError::InvalidConfig`] describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if let Some(turns) = self.max_turns {
            if turns > MAX_ALLOWED_TURNS {
                return Err(ClaudeError::invalid_config(format!(
                    "max_turns {turns} exceeds maximum allowed: {MAX_ALLOWED_TURNS}"
                )));
            }
        }
        if self.max_buffer_size == Some(0) {
            return Err(ClaudeError::invalid_config(
                "max_buffer_size must be greater than zero",
            ));
        }
        if self.can_use_tool.is_some() && self.permission_prompt_tool_name.is_some() {
            return Err(ClaudeError::invalid_config(
                "can_use_tool callback cannot be used with permission_prompt_tool_name",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ClaudeAgentOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaudeAgentOptions")
            .field("allowed_tools", &self.allowed_tools)
            .field("system_prompt", &self.system_prompt)
            .field("mcp_servers", &self.mcp_servers)
            .field("permission_mode", &self.permission_mode)
            .field("continue_conversation", &self.continue_conversation)
            .field("resume", &self.resume)
            .field("max_turns", &self.max_turns)
            .field("disallowed_tools", &self.disallowed_tools)
            .field("model", &self.model)
            .field(
                "permission_prompt_tool_name",
                &self.permission_prompt_tool_name,
            )
            .field("cwd", &self.cwd)
            .field("settings", &self.settings)
            .field("add_dirs", &self.add_dirs)
            .field("env", &self.env)
            .field("extra_args", &self.extra_args)
            .field("max_buffer_size", &self.max_buffer_size)
            .field(
                "can_use_tool",
                &self.can_use_tool.as_ref().map(|_| "<callback>"),
            )
            .field(
                "hooks",
                &self
                    .hooks
                    .as_ref()
                    .map(|h| format!("[{} hook types]", h.len())),
            )
            .field("include_partial_messages", &self.include_partial_messages)
            .field("fork_session", &self.fork_session)
            .field("agents", &self.agents)
            .field("setting_sources", &self.setting_sources)
            .field("stderr", &self.stderr.as_ref().map(|_| "<callback>"))
            .field("enable_file_checkpointing", &self.enable_file_checkpointing)
            .field("control_timeout", &self.control_timeout)
            .finish()
    }
}

// ============================================================================
// Options builder
// ============================================================================

/// Fluent constructor for [`ClaudeAgentOptions`]
#[derive(Debug, Default)]
pub struct ClaudeAgentOptionsBuilder {
    options: ClaudeAgentOptions,
}

impl ClaudeAgentOptionsBuilder {
    /// Set allowed tools
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(|t| t.into()).collect();
        self
    }

    /// Add an allowed tool
    pub fn add_allowed_tool(mut self, tool: impl Into<ToolName>) -> Self {
        self.options.allowed_tools.push(tool.into());
        self
    }

    /// Set disallowed tools
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(|t| t.into()).collect();
        self
    }

    /// Set system prompt
    pub fn system_prompt(mut self, prompt: impl Into<SystemPrompt>) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    /// Set MCP servers
    pub fn mcp_servers(mut self, servers: HashMap<String, McpServerConfig>) -> Self {
        self.options.mcp_servers = McpServers::Dict(servers);
        self
    }

    /// Add a single MCP server configuration
    pub fn add_mcp_server(mut self, name: impl Into<String>, config: McpServerConfig) -> Self {
        match &mut self.options.mcp_servers {
            McpServers::Dict(servers) => {
                servers.insert(name.into(), config);
            }
            other => {
                let mut servers = HashMap::new();
                servers.insert(name.into(), config);
                *other = McpServers::Dict(servers);
            }
        }
        self
    }

    /// Register an in-process MCP server under its own name
    pub fn sdk_mcp_server(self, server: SdkMcpServer) -> Self {
        let name = server.name().to_string();
        self.add_mcp_server(name, McpServerConfig::Sdk(Arc::new(server)))
    }

    /// Load MCP servers from a config file
    pub fn mcp_servers_path(mut self, path: PathBuf) -> Self {
        self.options.mcp_servers = McpServers::Path(path);
        self
    }

    /// Set permission mode
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Set the permission prompt tool name
    pub fn permission_prompt_tool_name(mut self, name: impl Into<String>) -> Self {
        self.options.permission_prompt_tool_name = Some(name.into());
        self
    }

    /// Set max turns (checked against [`MAX_ALLOWED_TURNS`] by `validate`)
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.options.max_turns = Some(turns);
        self
    }

    /// Set working directory
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Set the settings file
    pub fn settings(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.settings = Some(path.into());
        self
    }

    /// Add a directory to the agent's context
    pub fn add_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.add_dirs.push(path.into());
        self
    }

    /// Answer permission prompts in-process
    pub fn can_use_tool(mut self, callback: CanUseToolCallback) -> Self {
        self.options.can_use_tool = Some(callback);
        self
    }

    /// Set hooks
    pub fn hooks(mut self, hooks: HashMap<HookEvent, Vec<HookMatcher>>) -> Self {
        self.options.hooks = Some(hooks);
        self
    }

    /// Continue the latest conversation (`--continue`)
    pub fn continue_conversation(mut self, continue_conv: bool) -> Self {
        self.options.continue_conversation = continue_conv;
        self
    }

    /// Resume a stored session
    pub fn resume(mut self, session_id: impl Into<SessionId>) -> Self {
        self.options.resume = Some(session_id.into());
        self
    }

    /// Fork instead of continuing the resumed session
    pub fn fork_session(mut self, fork: bool) -> Self {
        self.options.fork_session = fork;
        self
    }

    /// Set AI model to use
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Add one variable to the child environment
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Merge a map into the child environment
    pub fn envs(mut self, envs: HashMap<String, String>) -> Self {
        self.options.env.extend(envs);
        self
    }

    /// Pass an extra flag through to the CLI (only allowlisted flags are forwarded)
    pub fn extra_arg(mut self, flag: impl Into<String>, value: Option<String>) -> Self {
        self.options.extra_args.insert(flag.into(), value);
        self
    }

    /// Set the maximum size of a single JSON frame
    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.options.max_buffer_size = Some(bytes);
        self
    }

    /// Emit `stream_event` messages for partial output
    pub fn include_partial_messages(mut self, include: bool) -> Self {
        self.options.include_partial_messages = include;
        self
    }

    /// Set custom agent definitions
    pub fn agents(mut self, agents: HashMap<String, AgentDefinition>) -> Self {
        self.options.agents = Some(agents);
        self
    }

    /// Set which setting sources the CLI loads
    pub fn setting_sources(mut self, sources: Vec<SettingSource>) -> Self {
        self.options.setting_sources = Some(sources);
        self
    }

    /// Receive stderr lines from the CLI
    pub fn stderr(mut self, callback: StderrCallback) -> Self {
        self.options.stderr = Some(callback);
        self
    }

    /// Enable file checkpointing for `rewind_files`
    pub fn enable_file_checkpointing(mut self, enable: bool) -> Self {
        self.options.enable_file_checkpointing = enable;
        self
    }

    /// Set how long outbound control requests wait for a response
    pub fn control_timeout(mut self, timeout: Duration) -> Self {
        self.options.control_timeout = Some(timeout);
        self
    }

    /// Build the options
    pub fn build(self) -> ClaudeAgentOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_rejects_too_many_turns() {
        let options = ClaudeAgentOptions::builder().max_turns(5000).build();
        assert!(matches!(
            options.validate(),
            Err(ClaudeError::InvalidConfig(_))
        ));
        assert!(ClaudeAgentOptions::builder()
            .max_turns(10)
            .build()
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_conflicting_permission_settings() {
        let callback: CanUseToolCallback =
            Arc::new(|_, _, _| Box::pin(async { Ok(PermissionResult::allow()) }));
        let options = ClaudeAgentOptions::builder()
            .can_use_tool(callback)
            .permission_prompt_tool_name("custom")
            .build();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_permission_update_wire_shape() {
        let update = PermissionUpdate::AddRules {
            rules: Some(vec![PermissionRuleValue {
                tool_name: "Bash".to_string(),
                rule_content: Some("ls:*".to_string()),
            }]),
            behavior: Some(PermissionBehavior::Allow),
            destination: Some(PermissionUpdateDestination::Session),
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "addRules",
                "rules": [{"toolName": "Bash", "ruleContent": "ls:*"}],
                "behavior": "allow",
                "destination": "session"
            })
        );
    }

    #[test]
    fn test_hook_output_uses_wire_names() {
        let output = HookOutput {
            continue_: Some(false),
            suppress_output: Some(true),
            stop_reason: Some("done".to_string()),
            system_message: Some("note".to_string()),
            hook_specific_output: Some(json!({"hookEventName": "PreToolUse"})),
            async_: Some(true),
            async_timeout: Some(500),
            ..Default::default()
        };
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["continue"], false);
        assert_eq!(value["suppressOutput"], true);
        assert_eq!(value["stopReason"], "done");
        assert_eq!(value["systemMessage"], "note");
        assert_eq!(value["hookSpecificOutput"]["hookEventName"], "PreToolUse");
        assert_eq!(value["async"], true);
        assert_eq!(value["asyncTimeout"], 500);
        assert!(value.get("decision").is_none());
    }

    #[test]
    fn test_add_mcp_server_accumulates() {
        let options = ClaudeAgentOptions::builder()
            .sdk_mcp_server(SdkMcpServer::new("calc"))
            .add_mcp_server(
                "fs",
                McpServerConfig::Stdio(McpStdioServerConfig {
                    server_type: None,
                    command: "fs-server".to_string(),
                    args: None,
                    env: None,
                }),
            )
            .build();
        match &options.mcp_servers {
            McpServers::Dict(servers) => assert_eq!(servers.len(), 2),
            other => panic!("unexpected servers: {other:?}"),
        }
        let sdk = options.mcp_servers.sdk_servers();
        assert_eq!(sdk.len(), 1);
        assert!(sdk.contains_key("calc"));
    }

    #[test]
    fn test_permission_mode_spelling() {
        assert_eq!(PermissionMode::AcceptEdits.as_str(), "acceptEdits");
        assert_eq!(
            serde_json::to_value(PermissionMode::BypassPermissions).unwrap(),
            json!("bypassPermissions")
        );
    }
}
