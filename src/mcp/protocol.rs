//! MCP JSON-RPC Protocol Types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0")
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    /// Request ID (absent for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name
    pub method: String,
    /// Method parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

impl JsonRpcRequest {
    /// Create a request with the given id, method and params
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Extract a request leniently from an arbitrary JSON value
    ///
    /// Only `method` is required; a missing `jsonrpc`, `id` or `params` is tolerated.
    pub fn from_value(value: &Value) -> Option<Self> {
        let method = value.get("method")?.as_str()?.to_string();
        Some(Self {
            jsonrpc: jsonrpc_version(),
            id: value.get("id").cloned().filter(|id| !id.is_null()),
            method,
            params: value.get("params").cloned().filter(|p| !p.is_null()),
        })
    }
}

/// JSON-RPC response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (matches the request)
    pub id: Value,
    /// Result (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl JsonRpcResponse {
    /// Create a successful response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Serialize into a JSON value
    pub fn into_value(self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert("jsonrpc".into(), Value::String(self.jsonrpc));
        obj.insert("id".into(), self.id);
        if let Some(result) = self.result {
            obj.insert("result".into(), result);
        }
        if let Some(error) = self.error {
            let mut err = serde_json::Map::new();
            err.insert("code".into(), Value::from(error.code));
            err.insert("message".into(), Value::String(error.message));
            if let Some(data) = error.data {
                err.insert("data".into(), data);
            }
            obj.insert("error".into(), Value::Object(err));
        }
        Value::Object(obj)
    }
}

/// JSON-RPC error structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    /// Method or named entity not found (-32601)
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Internal error (-32603)
    pub const INTERNAL_ERROR: i32 = -32603;

    fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Request that names no method, tool, resource or prompt
    pub fn unresolved(message: impl Into<String>) -> Self {
        Self::with_code(Self::METHOD_NOT_FOUND, message)
    }

    /// Method not found error
    pub fn method_not_found(method: &str) -> Self {
        Self::with_code(Self::METHOD_NOT_FOUND, format!("Method '{method}' not found"))
    }

    /// A tool, resource or prompt that is not registered
    pub fn not_found(what: &str, name: &str) -> Self {
        Self::with_code(Self::METHOD_NOT_FOUND, format!("{what} '{name}' not found"))
    }

    /// Internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_code(Self::INTERNAL_ERROR, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_request_serialization() {
        let request = JsonRpcRequest::new(1, "tools/list", None);
        let serialized = serde_json::to_string(&request).unwrap();
        assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
        assert!(serialized.contains("\"method\":\"tools/list\""));
        assert!(!serialized.contains("params"));
    }

    #[test]
    fn test_lenient_extraction() {
        let req = JsonRpcRequest::from_value(&json!({"method": "initialize", "id": 3})).unwrap();
        assert_eq!(req.id, Some(json!(3)));
        assert!(req.params.is_none());
        assert!(JsonRpcRequest::from_value(&json!({"id": 1})).is_none());
        assert!(JsonRpcRequest::from_value(&json!({"method": 7})).is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let value = JsonRpcResponse::error(json!(1), McpError::method_not_found("x/y")).into_value();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 1);
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_mcp_error_codes() {
        assert_eq!(McpError::unresolved("Missing method").code, -32601);
        assert_eq!(McpError::not_found("Tool", "t").code, -32601);
        assert_eq!(McpError::internal_error("test").code, -32603);
    }
}
