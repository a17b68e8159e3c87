//! Message parser for CLI output frames

use serde_json::Value;

use crate::error::{ClaudeError, Result};
use crate::types::{ContentBlock, Message};

const MESSAGE_TYPES: &[&str] = &["user", "assistant", "system", "result", "stream_event"];
const CONTENT_BLOCK_TYPES: &[&str] = &["text", "thinking", "tool_use", "tool_result"];

/// Parse a JSON value into a typed Message
///
/// # Errors
/// Returns `ClaudeError::MessageParse` (carrying the raw value) when the value is not
/// an object, has no string `type`, names an unknown type, or is missing required
/// nested fields such as `message.content`.
pub fn parse_message(data: Value) -> Result<Message> {
    let msg_type = match type_tag(&data, "message") {
        Ok(t) => t.to_string(),
        Err(message) => return Err(ClaudeError::message_parse(message, Some(data))),
    };

    if !MESSAGE_TYPES.contains(&msg_type.as_str()) {
        return Err(ClaudeError::message_parse(
            format!("Unknown message type: {msg_type}"),
            Some(data),
        ));
    }

    if matches!(msg_type.as_str(), "user" | "assistant")
        && data.pointer("/message/content").is_none()
    {
        return Err(ClaudeError::message_parse(
            format!("Missing required field in {msg_type} message: message.content"),
            Some(data),
        ));
    }

    serde_json::from_value(data.clone()).map_err(|e| {
        ClaudeError::message_parse(
            format!("Failed to parse {msg_type} message: {e}"),
            Some(data),
        )
    })
}

/// Parse a single content block
///
/// # Errors
/// Same contract as [`parse_message`], applied to the block's own `type` tag.
pub fn parse_content_block(data: Value) -> Result<ContentBlock> {
    let block_type = match type_tag(&data, "content block") {
        Ok(t) => t.to_string(),
        Err(message) => return Err(ClaudeError::message_parse(message, Some(data))),
    };

    if !CONTENT_BLOCK_TYPES.contains(&block_type.as_str()) {
        return Err(ClaudeError::message_parse(
            format!("Unknown content block type: {block_type}"),
            Some(data),
        ));
    }

    serde_json::from_value(data.clone()).map_err(|e| {
        ClaudeError::message_parse(
            format!("Failed to parse {block_type} block: {e}"),
            Some(data),
        )
    })
}

fn type_tag<'a>(data: &'a Value, what: &str) -> std::result::Result<&'a str, String> {
    let obj = data
        .as_object()
        .ok_or_else(|| format!("Invalid {what}: expected a JSON object"))?;
    match obj.get("type") {
        Some(Value::String(t)) => Ok(t),
        Some(_) => Err(format!("Invalid {what}: 'type' must be a string")),
        None => Err(format!("Invalid {what}: missing 'type' field")),
    }
}
