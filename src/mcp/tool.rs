//! Tool definitions for the SDK MCP server

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

use super::ToolHandler;
use crate::error::Result;

/// Tool served to the CLI through an in-process MCP server
///
/// The input schema may be a full JSON Schema object (anything with
/// `"type": "object"` or a `properties` map is kept as-is) or a flat map from
/// parameter name to type name, which is expanded into an object schema with
/// every parameter required:
///
/// ```rust
/// use claude_agent_control::mcp::{SdkMcpTool, ToolResult};
/// use serde_json::json;
///
/// let add = SdkMcpTool::new(
///     "add",
///     "Add two numbers",
///     json!({"a": "number", "b": "number"}),
///     |input| async move {
///         let a = input["a"].as_f64().unwrap_or(0.0);
///         let b = input["b"].as_f64().unwrap_or(0.0);
///         Ok(ToolResult::text(format!("{a} + {b} = {}", a + b)))
///     },
/// );
/// assert_eq!(add.input_schema()["required"], json!(["a", "b"]));
/// ```
pub struct SdkMcpTool {
    name: String,
    description: String,
    input_schema: Value,
    handler: ToolHandler,
}

impl SdkMcpTool {
    /// Create a new tool
    ///
    /// # Arguments
    ///
    /// * `name` - Name, unique within the server
    /// * `description` - Shown to the model
    /// * `input_schema` - JSON schema, or a flat `name -> type` map
    /// * `handler` - Async function receiving the call arguments
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: normalize_input_schema(input_schema),
            handler: Arc::new(move |input| Box::pin(handler(input))),
        }
    }

    /// Get the tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description shown to the model
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Get the input schema
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Run the handler
    pub async fn invoke(&self, input: Value) -> Result<ToolResult> {
        (self.handler)(input).await
    }

    /// Metadata entry for `tools/list`
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl std::fmt::Debug for SdkMcpTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Tool metadata as listed by `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema of the arguments
    pub input_schema: Value,
}

fn json_schema_type(type_name: &str) -> &'static str {
    match type_name {
        "string" | "str" => "string",
        "integer" | "int" => "integer",
        "number" | "float" => "number",
        "boolean" | "bool" => "boolean",
        _ => "string",
    }
}

/// Expand a flat `name -> type` map into a JSON schema; schemas pass through
pub(crate) fn normalize_input_schema(schema: Value) -> Value {
    let Value::Object(map) = schema else {
        return json!({"type": "object", "properties": {}});
    };

    let is_schema = map.get("type").and_then(Value::as_str) == Some("object")
        && map.get("properties").map_or(false, Value::is_object);
    if is_schema {
        return Value::Object(map);
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, spec) in map {
        let property = match &spec {
            Value::String(type_name) => json!({"type": json_schema_type(type_name)}),
            Value::Object(obj) if obj.contains_key("type") => spec.clone(),
            _ => json!({"type": "string"}),
        };
        required.push(Value::String(name.clone()));
        properties.insert(name, property);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Payload of a `tools/call` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Content blocks (text, images)
    pub content: Vec<ToolContent>,
    /// Marks the call as failed without a JSON-RPC error
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    /// Single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// Create an error result the model gets to see
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: Some(true),
        }
    }
}

/// One block of tool output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content
    Text {
        /// The text content
        text: String,
    },
    /// Image content
    Image {
        /// Base64-encoded image data
        data: String,
        /// Media type such as `image/png`
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_map_becomes_schema() {
        let schema = normalize_input_schema(json!({
            "a": "int",
            "b": "float",
            "flag": "bool",
            "name": "str",
            "weird": "uuid"
        }));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["a"]["type"], "integer");
        assert_eq!(schema["properties"]["b"]["type"], "number");
        assert_eq!(schema["properties"]["flag"]["type"], "boolean");
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["properties"]["weird"]["type"], "string");
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_schema_passes_through() {
        let input = json!({
            "type": "object",
            "properties": {"x": {"type": "number"}},
            "required": []
        });
        assert_eq!(normalize_input_schema(input.clone()), input);
    }

    #[test]
    fn test_parameter_named_properties_is_not_a_schema() {
        let schema = normalize_input_schema(json!({"properties": "string", "limit": "int"}));
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["properties"], json!({"type": "string"}));
        assert_eq!(schema["properties"]["limit"], json!({"type": "integer"}));
        assert_eq!(schema["required"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_non_object_schema_is_empty_object() {
        assert_eq!(
            normalize_input_schema(Value::Null),
            json!({"type": "object", "properties": {}})
        );
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let value = serde_json::to_value(ToolResult::error("nope")).unwrap();
        assert_eq!(
            value,
            json!({"content": [{"type": "text", "text": "nope"}], "isError": true})
        );
        let value = serde_json::to_value(ToolResult::text("ok")).unwrap();
        assert!(value.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_invoke_runs_handler() {
        let tool = SdkMcpTool::new("echo", "Echo", json!({"text": "string"}), |input| async move {
            Ok(ToolResult::text(input["text"].as_str().unwrap_or_default()))
        });
        let result = tool.invoke(json!({"text": "hi"})).await.unwrap();
        assert_eq!(result, ToolResult::text("hi"));
        assert_eq!(tool.info().input_schema["required"], json!(["text"]));
    }
}
