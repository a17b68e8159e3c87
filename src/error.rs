//! Error types for the control-protocol SDK

use thiserror::Error;

/// Longest slice of an offending line kept inside a [`ClaudeError::JsonDecode`]
const MAX_ERROR_LINE_LEN: usize = 200;

/// Main error type for the SDK
#[derive(Error, Debug)]
pub enum ClaudeError {
    /// No usable `claude` executable
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Spawn failure, bad working directory, write after fault or "not connected" misuse
    #[error("Connection error: {0}")]
    Connection(String),

    /// The CLI exited with a non-zero status
    #[error("Process error (exit code {exit_code}): {message}")]
    Process {
        /// Error message
        message: String,
        /// Process exit code
        exit_code: i32,
        /// Tail of the captured standard error output
        stderr: Option<String>,
    },

    /// A frame could not be decoded, or the reassembly buffer overflowed
    #[error("JSON decode error: {message} (line: {line})")]
    JsonDecode {
        /// The offending input, truncated
        line: String,
        /// What went wrong
        message: String,
    },

    /// Valid JSON that does not match any known message or content block shape
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Frame that was rejected
        data: Option<serde_json::Value>,
    },

    /// Control protocol error (error responses, missing callbacks, closed channel)
    #[error("Control protocol error: {0}")]
    ControlProtocol(String),

    /// An outbound control request got no response in time
    #[error("Control request timeout: {subtype}")]
    ControlTimeout {
        /// Subtype of the request that timed out
        subtype: String,
    },

    /// Hook execution error
    #[error("Hook error: {0}")]
    Hook(String),

    /// In-process MCP server failure
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ClaudeError>;

impl ClaudeError {
    /// `CliNotFound` with install instructions
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             If already installed locally, try:\n\
             export PATH=\"$HOME/node_modules/.bin:$PATH\"\n\
             \n\
             Or specify the path when creating transport"
                .to_string(),
        )
    }

    /// `Connection` error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// `Process` error for an exit code
    pub fn process(msg: impl Into<String>, exit_code: i32, stderr: Option<String>) -> Self {
        Self::Process {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create a JSON decode error, truncating the offending line
    pub fn json_decode(line: &str, msg: impl Into<String>) -> Self {
        let line = if line.len() > MAX_ERROR_LINE_LEN {
            let mut end = MAX_ERROR_LINE_LEN;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &line[..end])
        } else {
            line.to_string()
        };
        Self::JsonDecode {
            line,
            message: msg.into(),
        }
    }

    /// `MessageParse` error carrying the rejected frame
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// `ControlProtocol` error
    pub fn control_protocol(msg: impl Into<String>) -> Self {
        Self::ControlProtocol(msg.into())
    }

    /// Create a control timeout error for the given request subtype
    pub fn control_timeout(subtype: impl Into<String>) -> Self {
        Self::ControlTimeout {
            subtype: subtype.into(),
        }
    }

    /// Create a hook error
    pub fn hook(msg: impl Into<String>) -> Self {
        Self::Hook(msg.into())
    }

    /// Create an MCP error
    pub fn mcp(msg: impl Into<String>) -> Self {
        Self::Mcp(msg.into())
    }

    /// `InvalidConfig` error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Text carried by a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_decode_truncates_long_lines() {
        let line = "x".repeat(1000);
        match ClaudeError::json_decode(&line, "too big") {
            ClaudeError::JsonDecode { line, message } => {
                assert_eq!(line.len(), MAX_ERROR_LINE_LEN + 3);
                assert_eq!(message, "too big");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_json_decode_respects_char_boundaries() {
        let line = "é".repeat(150);
        assert!(matches!(
            ClaudeError::json_decode(&line, "bad"),
            ClaudeError::JsonDecode { .. }
        ));
    }

    #[test]
    fn test_process_error_display() {
        let err = ClaudeError::process("Command failed", 7, Some("boom".to_string()));
        assert_eq!(err.to_string(), "Process error (exit code 7): Command failed");
    }

    #[test]
    fn test_timeout_names_subtype() {
        let err = ClaudeError::control_timeout("interrupt");
        assert!(err.to_string().contains("interrupt"));
    }
}
