//! Control protocol frames and request correlation
//!
//! Control frames share the CLI's stdout/stdin with conversation messages and
//! are told apart by their `type`:
//!
//! ```text
//! {"type":"control_request","request_id":"req_1_ab12cd34","request":{"subtype":"interrupt"}}
//! {"type":"control_response","response":{"subtype":"success","request_id":"req_1_ab12cd34","response":{}}}
//! {"type":"control_cancel_request","request_id":"cli_7"}
//! ```
//!
//! # Example
//!
//! ```rust
//! use claude_agent_control::control::{ControlMessage, OutboundControlRequest, ProtocolHandler};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handler = ProtocolHandler::new();
//! let id = handler.next_id();
//! let line = handler.request_frame(&id, &OutboundControlRequest::Interrupt)?;
//! assert!(line.ends_with('\n'));
//!
//! match handler.deserialize_message(line.trim())? {
//!     ControlMessage::ControlRequest { request, .. } => {
//!         assert_eq!(request["subtype"], "interrupt");
//!     }
//!     other => panic!("unexpected frame: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::error::{ClaudeError, Result};
use crate::types::{PermissionMode, RequestId};

/// Outcome delivered to a waiting outbound request
pub type ControlOutcome = std::result::Result<Option<Value>, String>;

/// Control frame envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// A request, in either direction
    ControlRequest {
        /// Correlation id chosen by the requester
        request_id: RequestId,
        /// Request body, tagged by `subtype`
        request: Value,
    },
    /// A response, in either direction
    ControlResponse {
        /// Response body
        response: ControlResponse,
    },
    /// The CLI withdrew one of its requests
    ControlCancelRequest {
        /// Id of the withdrawn request
        #[serde(default)]
        request_id: Option<RequestId>,
    },
}

impl ControlMessage {
    /// Frame types that belong to the control channel
    pub const TYPES: [&'static str; 3] =
        ["control_request", "control_response", "control_cancel_request"];

    /// Classify a raw frame
    ///
    /// Returns `None` for conversation frames, `Some(Err)` for control frames
    /// that are malformed.
    pub fn classify(raw: &Value) -> Option<Result<Self>> {
        let frame_type = raw.get("type").and_then(Value::as_str)?;
        if !Self::TYPES.contains(&frame_type) {
            return None;
        }
        Some(serde_json::from_value(raw.clone()).map_err(|e| {
            ClaudeError::control_protocol(format!("Malformed {frame_type} frame: {e}"))
        }))
    }
}

/// Body of a `control_response` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponse {
    /// The request succeeded
    Success {
        /// Id of the answered request
        request_id: RequestId,
        /// Response payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
    },
    /// The request failed
    Error {
        /// Id of the answered request
        request_id: RequestId,
        /// Failure description
        #[serde(default)]
        error: String,
    },
}

impl ControlResponse {
    /// Id of the answered request
    pub fn request_id(&self) -> &RequestId {
        match self {
            ControlResponse::Success { request_id, .. } | ControlResponse::Error { request_id, .. } => {
                request_id
            }
        }
    }
}

/// Requests this library sends to the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum OutboundControlRequest {
    /// Handshake carrying the hook configuration
    Initialize {
        /// Hook config keyed by event name, with callback ids
        hooks: Option<Value>,
    },
    /// Stop the current turn
    Interrupt,
    /// Change the permission mode
    SetPermissionMode {
        /// New mode
        mode: PermissionMode,
    },
    /// Change the model (`None` restores the default)
    SetModel {
        /// Model name
        model: Option<String>,
    },
    /// Restore files to their state at a user message
    RewindFiles {
        /// `uuid` of the user message to rewind to
        user_message_id: String,
    },
}

impl OutboundControlRequest {
    /// Wire subtype of the request
    pub fn subtype(&self) -> &'static str {
        match self {
            OutboundControlRequest::Initialize { .. } => "initialize",
            OutboundControlRequest::Interrupt => "interrupt",
            OutboundControlRequest::SetPermissionMode { .. } => "set_permission_mode",
            OutboundControlRequest::SetModel { .. } => "set_model",
            OutboundControlRequest::RewindFiles { .. } => "rewind_files",
        }
    }
}

/// Requests the CLI sends to this library
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum InboundControlRequest {
    /// Ask whether a tool may run
    CanUseTool {
        /// Tool name
        tool_name: String,
        /// Tool arguments
        #[serde(default)]
        input: Value,
        /// Suggested permission updates, kept raw
        #[serde(default)]
        permission_suggestions: Option<Vec<Value>>,
        /// Path that triggered the check
        #[serde(default)]
        blocked_path: Option<String>,
    },
    /// Run a registered hook callback
    HookCallback {
        /// Id assigned during the handshake
        callback_id: String,
        /// Hook payload
        #[serde(default)]
        input: Value,
        /// Tool use the hook relates to
        #[serde(default)]
        tool_use_id: Option<String>,
    },
    /// JSON-RPC message for an in-process MCP server
    McpMessage {
        /// Target server
        server_name: String,
        /// JSON-RPC message
        message: Value,
    },
}

impl InboundControlRequest {
    const SUBTYPES: [&'static str; 3] = ["can_use_tool", "hook_callback", "mcp_message"];

    /// Parse a request body
    ///
    /// # Errors
    /// `ControlProtocol` for a missing or unsupported subtype or missing fields
    pub fn parse(request: &Value) -> Result<Self> {
        let subtype = request
            .get("subtype")
            .and_then(Value::as_str)
            .ok_or_else(|| ClaudeError::control_protocol("Control request is missing subtype"))?;

        if !Self::SUBTYPES.contains(&subtype) {
            return Err(ClaudeError::control_protocol(format!(
                "Unsupported control request subtype: {subtype}"
            )));
        }

        serde_json::from_value(request.clone()).map_err(|e| {
            ClaudeError::control_protocol(format!("Invalid {subtype} request: {e}"))
        })
    }
}

/// Id generation and pending-request bookkeeping for one engine
pub struct ProtocolHandler {
    next_request_id: AtomicU64,
    pending: Mutex<HashMap<RequestId, oneshot::Sender<ControlOutcome>>>,
}

impl ProtocolHandler {
    /// Create a new protocol handler
    pub fn new() -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Generate the next request id (`req_<counter>_<8 hex chars>`)
    pub fn next_id(&self) -> RequestId {
        let n = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let suffix = Uuid::new_v4().simple().to_string();
        RequestId::new(format!("req_{n}_{}", &suffix[..8]))
    }

    /// Allocate an id and a pending slot for an outbound request
    pub async fn register(&self) -> (RequestId, oneshot::Receiver<ControlOutcome>) {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Complete the pending request a response belongs to
    ///
    /// Returns `false` when no request with that id is waiting.
    pub async fn resolve(&self, response: ControlResponse) -> bool {
        let Some(tx) = self.pending.lock().await.remove(response.request_id()) else {
            tracing::debug!(request_id = %response.request_id(), "Ignoring response for unknown request");
            return false;
        };
        let outcome = match response {
            ControlResponse::Success { response, .. } => Ok(response),
            ControlResponse::Error { error, .. } => Err(error),
        };
        let _ = tx.send(outcome);
        true
    }

    /// Drop a pending request without completing it
    pub async fn evict(&self, id: &RequestId) {
        self.pending.lock().await.remove(id);
    }

    /// Fail every pending request with the same reason
    pub async fn fail_all(&self, reason: &str) {
        let drained: Vec<_> = self.pending.lock().await.drain().collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), reason, "Failing pending control requests");
        }
        for (_, tx) in drained {
            let _ = tx.send(Err(reason.to_string()));
        }
    }

    /// Number of requests awaiting a response
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Serialized `control_request` line for an outbound request
    pub fn request_frame(&self, id: &RequestId, request: &OutboundControlRequest) -> Result<String> {
        self.serialize_message(&ControlMessage::ControlRequest {
            request_id: id.clone(),
            request: serde_json::to_value(request)?,
        })
    }

    /// Serialized success `control_response` line
    pub fn success_frame(&self, request_id: &RequestId, response: Value) -> Result<String> {
        self.serialize_message(&ControlMessage::ControlResponse {
            response: ControlResponse::Success {
                request_id: request_id.clone(),
                response: Some(response),
            },
        })
    }

    /// Serialized error `control_response` line
    pub fn error_frame(&self, request_id: &RequestId, error: impl Into<String>) -> Result<String> {
        self.serialize_message(&ControlMessage::ControlResponse {
            response: ControlResponse::Error {
                request_id: request_id.clone(),
                error: error.into(),
            },
        })
    }

    /// Serialize control message to a JSON line
    pub fn serialize_message(&self, message: &ControlMessage) -> Result<String> {
        serde_json::to_string(message)
            .map(|s| format!("{s}\n"))
            .map_err(ClaudeError::from)
    }

    /// Deserialize control message from JSON
    pub fn deserialize_message(&self, json: &str) -> Result<ControlMessage> {
        serde_json::from_str(json).map_err(|e| ClaudeError::json_decode(json, e.to_string()))
    }
}

impl Default for ProtocolHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProtocolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolHandler")
            .field("next_request_id", &self.next_request_id.load(Ordering::SeqCst))
            .finish()
    }
}
