//! The control/query engine
//!
//! One read loop owns the inbound side of the transport. Every frame is
//! classified in arrival order: responses complete pending outbound requests,
//! inbound requests are answered by spawned handler tasks, cancel frames fire
//! the matching handler's token, and everything else is parsed and queued for
//! [`Query::receive_messages`].

use futures::{FutureExt, Stream};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::protocol::{ControlMessage, InboundControlRequest, OutboundControlRequest, ProtocolHandler};
use crate::error::{panic_message, ClaudeError, Result};
use crate::hooks::{HookInput, HookManager};
use crate::mcp::{JsonRpcResponse, McpError, SdkMcpServer};
use crate::message::parse_message;
use crate::permissions::permission_response;
use crate::transport::Transport;
use crate::types::{
    CanUseToolCallback, ClaudeAgentOptions, HookContext, HookEvent, HookMatcher, Message,
    PermissionMode, RequestId, ToolName, ToolPermissionContext,
};

/// Default wait for a control response
pub const DEFAULT_CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Engine configuration
#[derive(Clone)]
pub struct QueryConfig {
    /// Whether the transport accepts frames on stdin
    pub is_streaming_mode: bool,
    /// Answers `can_use_tool` requests
    pub can_use_tool: Option<CanUseToolCallback>,
    /// Hook matchers announced during `initialize`
    pub hooks: Option<HashMap<HookEvent, Vec<HookMatcher>>>,
    /// In-process MCP servers by name
    pub sdk_mcp_servers: HashMap<String, Arc<SdkMcpServer>>,
    /// How long outbound control requests wait
    pub control_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            is_streaming_mode: true,
            can_use_tool: None,
            hooks: None,
            sdk_mcp_servers: HashMap::new(),
            control_timeout: DEFAULT_CONTROL_TIMEOUT,
        }
    }
}

impl QueryConfig {
    /// Take callbacks, hooks, servers and the timeout from session options
    pub fn from_options(options: &ClaudeAgentOptions, is_streaming_mode: bool) -> Self {
        Self {
            is_streaming_mode,
            can_use_tool: options.can_use_tool.clone(),
            hooks: options.hooks.clone(),
            sdk_mcp_servers: options.mcp_servers.sdk_servers(),
            control_timeout: options.control_timeout.unwrap_or(DEFAULT_CONTROL_TIMEOUT),
        }
    }
}

impl std::fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut servers: Vec<_> = self.sdk_mcp_servers.keys().collect();
        servers.sort();
        f.debug_struct("QueryConfig")
            .field("is_streaming_mode", &self.is_streaming_mode)
            .field("can_use_tool", &self.can_use_tool.as_ref().map(|_| "<callback>"))
            .field("hooks", &self.hooks.as_ref().map(|h| h.len()))
            .field("sdk_mcp_servers", &servers)
            .field("control_timeout", &self.control_timeout)
            .finish()
    }
}

/// Item on the internal message queue
enum Delivery {
    Message(Result<Message>),
    Error(ClaudeError),
    End,
}

/// State shared between the engine, its read loop and handler tasks
struct Inner {
    transport: Mutex<Box<dyn Transport>>,
    protocol: ProtocolHandler,
    hooks: HookManager,
    hooks_config: Option<Value>,
    can_use_tool: Option<CanUseToolCallback>,
    sdk_mcp_servers: HashMap<String, Arc<SdkMcpServer>>,
    inflight: Mutex<HashMap<RequestId, CancellationToken>>,
    closed: AtomicBool,
    shutdown: CancellationToken,
}

/// Control-protocol engine over one transport
///
/// # Example
///
/// ```no_run
/// use claude_agent_control::control::{Query, QueryConfig};
/// use claude_agent_control::transport::{PromptInput, SubprocessTransport};
/// use claude_agent_control::{ClaudeAgentOptions, Transport};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ClaudeAgentOptions::default();
/// let config = QueryConfig::from_options(&options, true);
/// let mut transport = SubprocessTransport::new(PromptInput::Stream, options, None)?;
/// transport.connect().await?;
///
/// let query = Query::new(Box::new(transport), config);
/// query.start().await;
/// query.initialize().await?;
///
/// let mut messages = Box::pin(query.receive_messages());
/// while let Some(message) = messages.next().await {
///     println!("{:?}", message?);
/// }
/// query.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Query {
    inner: Arc<Inner>,
    is_streaming_mode: bool,
    control_timeout: Duration,
    sender: std::sync::Mutex<Option<mpsc::UnboundedSender<Delivery>>>,
    messages: Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>,
    finished: Arc<AtomicBool>,
    read_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    server_info: std::sync::RwLock<Option<Value>>,
}

impl Query {
    /// Wrap a connected transport
    ///
    /// Hook callback ids are assigned here, so the registry is fixed from now on.
    pub fn new(transport: Box<dyn Transport>, config: QueryConfig) -> Self {
        let (hooks, hooks_config) = match config.hooks {
            Some(ref hooks) => HookManager::from_config(hooks),
            None => (HookManager::new(), None),
        };
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(Inner {
                transport: Mutex::new(transport),
                protocol: ProtocolHandler::new(),
                hooks,
                hooks_config,
                can_use_tool: config.can_use_tool,
                sdk_mcp_servers: config.sdk_mcp_servers,
                inflight: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
            is_streaming_mode: config.is_streaming_mode,
            control_timeout: config.control_timeout,
            sender: std::sync::Mutex::new(Some(tx)),
            messages: Arc::new(Mutex::new(rx)),
            finished: Arc::new(AtomicBool::new(false)),
            read_task: std::sync::Mutex::new(None),
            server_info: std::sync::RwLock::new(None),
        }
    }

    /// Launch the read loop. Later calls do nothing.
    pub async fn start(&self) {
        let Some(tx) = self.sender.lock().ok().and_then(|mut slot| slot.take()) else {
            return;
        };
        // Only held long enough to take the receiver
        let frames = self.inner.transport.lock().await.read_messages();
        let handle = tokio::spawn(read_loop(self.inner.clone(), frames, tx));
        if let Ok(mut slot) = self.read_task.lock() {
            *slot = Some(handle);
        }
    }

    /// Perform the `initialize` handshake
    ///
    /// Sends the hook configuration and stores the CLI's reply as server info.
    /// In non-streaming mode nothing is sent and `Ok(None)` is returned.
    pub async fn initialize(&self) -> Result<Option<Value>> {
        if !self.is_streaming_mode {
            return Ok(None);
        }
        let response = self
            .send_control_request(OutboundControlRequest::Initialize {
                hooks: self.inner.hooks_config.clone(),
            })
            .await?
            .unwrap_or_else(|| json!({}));

        tracing::info!(
            hooks = self.inner.hooks.len(),
            mcp_servers = self.inner.sdk_mcp_servers.len(),
            "Control protocol initialized"
        );
        if let Ok(mut slot) = self.server_info.write() {
            *slot = Some(response.clone());
        }
        Ok(Some(response))
    }

    /// Reply to the `initialize` handshake, if it happened
    pub fn server_info(&self) -> Option<Value> {
        self.server_info.read().ok().and_then(|info| info.clone())
    }

    /// Whether the engine runs over a stdin-streaming transport
    pub fn is_streaming_mode(&self) -> bool {
        self.is_streaming_mode
    }

    /// Stop the current turn
    pub async fn interrupt(&self) -> Result<()> {
        self.send_control_request(OutboundControlRequest::Interrupt)
            .await
            .map(|_| ())
    }

    /// Change the permission mode
    pub async fn set_permission_mode(&self, mode: PermissionMode) -> Result<()> {
        self.send_control_request(OutboundControlRequest::SetPermissionMode { mode })
            .await
            .map(|_| ())
    }

    /// Change the model; `None` restores the default
    pub async fn set_model(&self, model: Option<String>) -> Result<()> {
        self.send_control_request(OutboundControlRequest::SetModel { model })
            .await
            .map(|_| ())
    }

    /// Restore tracked files to their state at the given user message
    pub async fn rewind_files(&self, user_message_id: impl Into<String>) -> Result<()> {
        self.send_control_request(OutboundControlRequest::RewindFiles {
            user_message_id: user_message_id.into(),
        })
        .await
        .map(|_| ())
    }

    /// Send an outbound control request and wait for its response
    ///
    /// # Errors
    /// - `ControlProtocol` in non-streaming mode, for an error response, or when
    ///   the stream ends first
    /// - `ControlTimeout` when no response arrives in time
    /// - `Connection` when the engine is closed or the write fails
    pub async fn send_control_request(&self, request: OutboundControlRequest) -> Result<Option<Value>> {
        let subtype = request.subtype();
        if !self.is_streaming_mode {
            return Err(ClaudeError::control_protocol(format!(
                "{subtype} requires streaming mode"
            )));
        }
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ClaudeError::connection("Query is closed"));
        }

        let protocol = &self.inner.protocol;
        let (id, rx) = protocol.register().await;
        let sent = match protocol.request_frame(&id, &request) {
            Ok(line) => self.inner.write_line(&line).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            protocol.evict(&id).await;
            return Err(e);
        }
        tracing::debug!(request_id = %id, subtype, "Sent control request");

        match tokio::time::timeout(self.control_timeout, rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(error))) => Err(ClaudeError::control_protocol(error)),
            Ok(Err(_)) => Err(ClaudeError::control_protocol(format!(
                "Control request {id} was abandoned"
            ))),
            Err(_) => {
                protocol.evict(&id).await;
                tracing::warn!(request_id = %id, subtype, "Control request timed out");
                Err(ClaudeError::control_timeout(subtype))
            }
        }
    }

    /// Number of outbound requests still waiting for a response
    pub async fn pending_control_requests(&self) -> usize {
        self.inner.protocol.pending_count().await
    }

    /// Write one frame (for example a user turn) to the transport
    pub async fn write_frame(&self, frame: &Value) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ClaudeError::connection("Query is closed"));
        }
        let line = format!("{}\n", serde_json::to_string(frame)?);
        self.inner.write_line(&line).await
    }

    /// Close the transport's input
    pub async fn end_input(&self) -> Result<()> {
        self.inner.transport.lock().await.end_input().await
    }

    /// Stream of conversation messages in arrival order
    ///
    /// The stream ends at end of input; a transport failure is yielded as the
    /// last item. Dropping the stream early keeps the remaining messages for the
    /// next call. Once the end has been seen, later calls yield nothing.
    pub fn receive_messages(&self) -> impl Stream<Item = Result<Message>> + Send + 'static {
        let messages = self.messages.clone();
        let finished = self.finished.clone();

        async_stream::stream! {
            if !finished.load(Ordering::SeqCst) {
                let mut rx = messages.lock_owned().await;
                loop {
                    match rx.recv().await {
                        Some(Delivery::Message(message)) => yield message,
                        Some(Delivery::Error(e)) => {
                            finished.store(true, Ordering::SeqCst);
                            yield Err(e);
                            break;
                        }
                        Some(Delivery::End) | None => {
                            finished.store(true, Ordering::SeqCst);
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Stop the read loop, cancel in-flight handlers and close the transport
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.read_task.lock().ok().and_then(|mut slot| slot.take()) {
            task.abort();
        }
        // Never started: drop the sender so readers see the end
        if let Ok(mut slot) = self.sender.lock() {
            slot.take();
        }
        self.inner.shutdown.cancel();
        self.inner.protocol.fail_all("Query closed").await;
        self.inner.transport.lock().await.close().await;
        tracing::debug!("Query closed");
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        if let Some(task) = self.read_task.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    async fn write_line(&self, line: &str) -> Result<()> {
        self.transport.lock().await.write(line).await
    }

    async fn track(&self, request_id: RequestId) -> CancellationToken {
        let token = self.shutdown.child_token();
        self.inflight.lock().await.insert(request_id, token.clone());
        token
    }

    async fn cancel(&self, request_id: Option<RequestId>) {
        let Some(request_id) = request_id else {
            tracing::debug!("Ignoring control_cancel_request without request_id");
            return;
        };
        match self.inflight.lock().await.get(&request_id) {
            Some(token) => {
                tracing::debug!(request_id = %request_id, "Cancelling control request handler");
                token.cancel();
            }
            None => tracing::debug!(request_id = %request_id, "Cancel for unknown control request"),
        }
    }

    /// Answer one inbound request; exactly one response is written
    async fn respond(self: Arc<Self>, request_id: RequestId, request: Value, signal: CancellationToken) {
        let outcome = AssertUnwindSafe(self.handle_request(request, signal))
            .catch_unwind()
            .await;
        self.inflight.lock().await.remove(&request_id);

        let frame = match outcome {
            Ok(Ok(response)) => self.protocol.success_frame(&request_id, response),
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request_id, error = %e, "Control request failed");
                self.protocol.error_frame(&request_id, error_text(&e))
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                tracing::error!(request_id = %request_id, panic = %message, "Control request handler panicked");
                self.protocol
                    .error_frame(&request_id, format!("Handler panicked: {message}"))
            }
        };

        let written = match frame {
            Ok(line) => self.write_line(&line).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to send control response");
        }
    }

    async fn handle_request(&self, request: Value, signal: CancellationToken) -> Result<Value> {
        match InboundControlRequest::parse(&request)? {
            InboundControlRequest::CanUseTool {
                tool_name,
                input,
                permission_suggestions,
                blocked_path,
            } => {
                let callback = self
                    .can_use_tool
                    .as_ref()
                    .ok_or_else(|| ClaudeError::control_protocol("canUseTool callback is not provided"))?;
                let suggestions = permission_suggestions
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|s| serde_json::from_value(s).ok())
                    .collect();
                let context = ToolPermissionContext {
                    suggestions,
                    blocked_path,
                    signal,
                };
                let result = callback(ToolName::new(tool_name), input.clone(), context).await?;
                Ok(permission_response(&result, &input))
            }
            InboundControlRequest::HookCallback {
                callback_id,
                input,
                tool_use_id,
            } => {
                if !self.hooks.contains(&callback_id) {
                    return Err(ClaudeError::hook(format!(
                        "No hook callback found for ID: {callback_id}"
                    )));
                }
                let input = HookInput::from_value(input);
                let output = self
                    .hooks
                    .invoke(&callback_id, input, tool_use_id, HookContext { signal })
                    .await?;
                Ok(serde_json::to_value(output)?)
            }
            InboundControlRequest::McpMessage {
                server_name,
                message,
            } => {
                let reply = match self.sdk_mcp_servers.get(&server_name) {
                    Some(server) => server.handle_message(message).await,
                    None => {
                        let id = message.get("id").cloned().unwrap_or(Value::Null);
                        JsonRpcResponse::error(id, McpError::not_found("Server", &server_name))
                            .into_value()
                    }
                };
                Ok(json!({ "mcp_response": reply }))
            }
        }
    }
}

/// Error text without the variant's display prefix
fn error_text(err: &ClaudeError) -> String {
    match err {
        ClaudeError::ControlProtocol(message)
        | ClaudeError::Hook(message)
        | ClaudeError::Mcp(message)
        | ClaudeError::Connection(message)
        | ClaudeError::InvalidConfig(message) => message.clone(),
        other => other.to_string(),
    }
}

async fn read_loop(
    inner: Arc<Inner>,
    mut frames: mpsc::UnboundedReceiver<Result<Value>>,
    tx: mpsc::UnboundedSender<Delivery>,
) {
    let mut failed = false;

    while let Some(frame) = frames.recv().await {
        let raw = match frame {
            Ok(raw) => raw,
            Err(e @ ClaudeError::JsonDecode { .. }) => {
                tracing::warn!(error = %e, "Skipping undecodable frame");
                let _ = tx.send(Delivery::Message(Err(e)));
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "Transport read failed");
                let _ = tx.send(Delivery::Error(e));
                failed = true;
                break;
            }
        };

        match ControlMessage::classify(&raw) {
            None => {
                let _ = tx.send(Delivery::Message(parse_message(raw)));
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Malformed control frame");
                let _ = tx.send(Delivery::Message(Err(e)));
            }
            Some(Ok(ControlMessage::ControlResponse { response })) => {
                inner.protocol.resolve(response).await;
            }
            Some(Ok(ControlMessage::ControlRequest {
                request_id,
                request,
            })) => {
                let subtype = request
                    .get("subtype")
                    .and_then(Value::as_str)
                    .unwrap_or("<none>");
                tracing::debug!(request_id = %request_id, subtype, "Received control request");
                let signal = inner.track(request_id.clone()).await;
                tokio::spawn(inner.clone().respond(request_id, request, signal));
            }
            Some(Ok(ControlMessage::ControlCancelRequest { request_id })) => {
                inner.cancel(request_id).await;
            }
        }
    }

    inner
        .protocol
        .fail_all("Control stream ended before a response arrived")
        .await;
    if !failed {
        let _ = tx.send(Delivery::End);
    }
    tracing::debug!("Read loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_text_strips_prefix() {
        let err = ClaudeError::control_protocol("Unsupported control request subtype: x");
        assert_eq!(error_text(&err), "Unsupported control request subtype: x");
        let err = ClaudeError::control_timeout("interrupt");
        assert_eq!(error_text(&err), err.to_string());
    }

    #[test]
    fn test_config_from_options() {
        let options = ClaudeAgentOptions::builder()
            .control_timeout(Duration::from_secs(5))
            .sdk_mcp_server(SdkMcpServer::new("calc"))
            .build();
        let config = QueryConfig::from_options(&options, false);
        assert!(!config.is_streaming_mode);
        assert_eq!(config.control_timeout, Duration::from_secs(5));
        assert!(config.sdk_mcp_servers.contains_key("calc"));

        let defaults = QueryConfig::from_options(&ClaudeAgentOptions::default(), true);
        assert_eq!(defaults.control_timeout, DEFAULT_CONTROL_TIMEOUT);
    }
}
