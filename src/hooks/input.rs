//! Typed hook inputs
//!
//! The CLI sends hook payloads as loose JSON keyed by `hook_event_name`. These
//! types give each event its own shape; anything else keeps the raw value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields present on every hook payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseHookInput {
    /// Session the hook fired in
    #[serde(default)]
    pub session_id: String,
    /// Path of the session transcript
    #[serde(default)]
    pub transcript_path: String,
    /// Working directory of the agent
    #[serde(default)]
    pub cwd: String,
    /// Active permission mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
}

/// Payload of a `PreToolUse` hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreToolUseHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Tool about to run
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub tool_input: Value,
}

/// Payload of a `PostToolUse` hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostToolUseHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Tool that ran
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub tool_input: Value,
    /// Tool output
    #[serde(default)]
    pub tool_response: Value,
}

/// Payload of a `UserPromptSubmit` hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPromptSubmitHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// The submitted prompt
    pub prompt: String,
}

/// Payload of a `Stop` or `SubagentStop` hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// Whether a stop hook is already keeping the agent alive
    #[serde(default)]
    pub stop_hook_active: bool,
}

/// Payload of a `PreCompact` hook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreCompactHookInput {
    /// Common fields
    #[serde(flatten)]
    pub base: BaseHookInput,
    /// "manual" or "auto"
    pub trigger: String,
    /// Instructions given to `/compact`
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// Hook payload, typed by event
#[derive(Debug, Clone, PartialEq)]
pub enum HookInput {
    /// Before a tool runs
    PreToolUse(PreToolUseHookInput),
    /// After a tool runs
    PostToolUse(PostToolUseHookInput),
    /// A prompt was submitted
    UserPromptSubmit(UserPromptSubmitHookInput),
    /// The agent is stopping
    Stop(StopHookInput),
    /// A subagent is stopping
    SubagentStop(StopHookInput),
    /// The conversation is about to be compacted
    PreCompact(PreCompactHookInput),
    /// An event this crate has no dedicated type for
    Other {
        /// Event name as sent
        hook_event_name: String,
        /// Common fields
        base: BaseHookInput,
        /// The untouched payload
        raw: Value,
    },
}

fn typed<T: serde::de::DeserializeOwned>(value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(input) => Some(input),
        Err(e) => {
            tracing::warn!(error = %e, "Hook input does not match its event, passing it untyped");
            None
        }
    }
}

impl HookInput {
    /// Build a typed input from the raw payload
    ///
    /// Payloads without `hook_event_name`, for events without a dedicated type,
    /// or that do not fit their event's shape come back as [`HookInput::Other`].
    pub fn from_value(value: Value) -> Self {
        let event = value
            .get("hook_event_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let input = match event.as_str() {
            "PreToolUse" => typed(&value).map(HookInput::PreToolUse),
            "PostToolUse" => typed(&value).map(HookInput::PostToolUse),
            "UserPromptSubmit" => typed(&value).map(HookInput::UserPromptSubmit),
            "Stop" => typed(&value).map(HookInput::Stop),
            "SubagentStop" => typed(&value).map(HookInput::SubagentStop),
            "PreCompact" => typed(&value).map(HookInput::PreCompact),
            _ => None,
        };

        input.unwrap_or_else(|| HookInput::Other {
            base: serde_json::from_value(value.clone()).unwrap_or_default(),
            hook_event_name: event,
            raw: value,
        })
    }

    /// Event name as the CLI spells it
    pub fn event_name(&self) -> &str {
        match self {
            HookInput::PreToolUse(_) => "PreToolUse",
            HookInput::PostToolUse(_) => "PostToolUse",
            HookInput::UserPromptSubmit(_) => "UserPromptSubmit",
            HookInput::Stop(_) => "Stop",
            HookInput::SubagentStop(_) => "SubagentStop",
            HookInput::PreCompact(_) => "PreCompact",
            HookInput::Other {
                hook_event_name, ..
            } => hook_event_name,
        }
    }

    /// Common fields
    pub fn base(&self) -> &BaseHookInput {
        match self {
            HookInput::PreToolUse(i) => &i.base,
            HookInput::PostToolUse(i) => &i.base,
            HookInput::UserPromptSubmit(i) => &i.base,
            HookInput::Stop(i) | HookInput::SubagentStop(i) => &i.base,
            HookInput::PreCompact(i) => &i.base,
            HookInput::Other { base, .. } => base,
        }
    }

    /// Tool name for tool events
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            HookInput::PreToolUse(i) => Some(&i.tool_name),
            HookInput::PostToolUse(i) => Some(&i.tool_name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pre_tool_use_is_typed() {
        let input = HookInput::from_value(json!({
            "hook_event_name": "PreToolUse",
            "session_id": "s1",
            "transcript_path": "/tmp/t.jsonl",
            "cwd": "/work",
            "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        }));
        assert_eq!(input.event_name(), "PreToolUse");
        assert_eq!(input.tool_name(), Some("Bash"));
        assert_eq!(input.base().cwd, "/work");
    }

    #[test]
    fn test_unknown_event_keeps_raw() {
        let raw = json!({"hook_event_name": "Notification", "session_id": "s", "message": "hi"});
        match HookInput::from_value(raw.clone()) {
            HookInput::Other {
                hook_event_name,
                base,
                raw: kept,
            } => {
                assert_eq!(hook_event_name, "Notification");
                assert_eq!(base.session_id, "s");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn test_missing_event_name_is_untyped() {
        let raw = json!({"session_id": "s", "cwd": "/w"});
        match HookInput::from_value(raw.clone()) {
            HookInput::Other {
                hook_event_name,
                base,
                raw: kept,
            } => {
                assert_eq!(hook_event_name, "");
                assert_eq!(base.cwd, "/w");
                assert_eq!(kept, raw);
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn test_known_event_with_missing_field_falls_back() {
        let raw = json!({"hook_event_name": "PreToolUse", "session_id": "s"});
        let input = HookInput::from_value(raw.clone());
        match &input {
            HookInput::Other { raw: kept, .. } => assert_eq!(kept, &raw),
            other => panic!("unexpected input: {other:?}"),
        }
        assert_eq!(input.event_name(), "PreToolUse");
        assert_eq!(input.base().session_id, "s");
        assert_eq!(input.tool_name(), None);

        let input = HookInput::from_value(json!({"hook_event_name": "UserPromptSubmit"}));
        assert_eq!(input.event_name(), "UserPromptSubmit");
        assert!(matches!(input, HookInput::Other { .. }));
    }
}
