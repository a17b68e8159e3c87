//! JSON-RPC behaviour of the in-process MCP server

use claude_agent_control::mcp::{
    PromptResult, ResourceContents, SdkMcpPrompt, SdkMcpResource, SdkMcpServer, SdkMcpTool,
    ToolResult, MCP_PROTOCOL_VERSION,
};
use claude_agent_control::ClaudeError;
use serde_json::{json, Value};

fn server() -> SdkMcpServer {
    SdkMcpServer::new("workbench")
        .version("0.3.0")
        .tool(SdkMcpTool::new(
            "add",
            "Add two integers",
            json!({"a": "int", "b": "int"}),
            |input| async move {
                let a = input["a"].as_i64().unwrap_or(0);
                let b = input["b"].as_i64().unwrap_or(0);
                Ok(ToolResult::text(format!("{a}+{b}={}", a + b)))
            },
        ))
        .tool(SdkMcpTool::new(
            "divide",
            "Divide two numbers",
            json!({
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }),
            |input| async move {
                let b = input["b"].as_f64().unwrap_or(0.0);
                if b == 0.0 {
                    return Err(ClaudeError::mcp("division by zero"));
                }
                Ok(ToolResult::text(format!("{}", input["a"].as_f64().unwrap_or(0.0) / b)))
            },
        ))
        .tool(SdkMcpTool::new(
            "explode",
            "Always panics",
            json!({}),
            |_input| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(ToolResult::text("unreachable"))
            },
        ))
        .resource(
            SdkMcpResource::new("file:///notes.txt", "notes", |uri| async move {
                Ok(ResourceContents::text(uri, "remember the milk"))
            })
            .description("Scratch notes")
            .mime_type("text/plain"),
        )
        .prompt(
            SdkMcpPrompt::new("review", |args: Value| async move {
                let language = args["language"].as_str().unwrap_or("code").to_string();
                Ok(PromptResult::user_text(format!("Review this {language} carefully")))
            })
            .description("Code review prompt")
            .argument("language", true),
        )
}

async fn call(server: &SdkMcpServer, method: &str, params: Value) -> Value {
    server
        .handle_message(json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}))
        .await
}

#[tokio::test]
async fn test_initialize_reports_capabilities() {
    let reply = call(&server(), "initialize", json!({})).await;
    let result = &reply["result"];
    assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
    assert_eq!(result["serverInfo"], json!({"name": "workbench", "version": "0.3.0"}));
    assert!(result["capabilities"].get("tools").is_some());
    assert!(result["capabilities"].get("resources").is_some());
    assert!(result["capabilities"].get("prompts").is_some());

    let bare = SdkMcpServer::new("empty");
    let reply = call(&bare, "initialize", json!({})).await;
    assert_eq!(reply["result"]["capabilities"], json!({}));
}

#[tokio::test]
async fn test_tools_list_normalizes_schemas() {
    let reply = call(&server(), "tools/list", json!({})).await;
    let tools = reply["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 3);

    assert_eq!(tools[0]["name"], "add");
    assert_eq!(
        tools[0]["inputSchema"],
        json!({
            "type": "object",
            "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
            "required": ["a", "b"]
        })
    );
    assert_eq!(tools[1]["inputSchema"]["required"], json!(["a", "b"]));
    assert_eq!(tools[1]["inputSchema"]["properties"]["a"]["type"], "number");
}

#[tokio::test]
async fn test_tools_call_success() {
    let reply = call(
        &server(),
        "tools/call",
        json!({"name": "add", "arguments": {"a": 15, "b": 27}}),
    )
    .await;
    assert_eq!(reply["id"], 1);
    assert_eq!(
        reply["result"],
        json!({"content": [{"type": "text", "text": "15+27=42"}]})
    );
}

#[tokio::test]
async fn test_tool_failures_map_to_internal_error() {
    let server = server();

    let reply = call(&server, "tools/call", json!({"name": "divide", "arguments": {"a": 1, "b": 0}})).await;
    assert_eq!(reply["error"]["code"], -32603);
    assert!(reply["error"]["message"].as_str().unwrap().contains("division by zero"));

    let reply = call(&server, "tools/call", json!({"name": "explode", "arguments": {}})).await;
    assert_eq!(reply["error"]["code"], -32603);
    assert!(reply["error"]["message"].as_str().unwrap().contains("kaboom"));

    // The server keeps working after a panic
    let reply = call(&server, "tools/call", json!({"name": "add", "arguments": {"a": 1, "b": 1}})).await;
    assert_eq!(reply["result"]["content"][0]["text"], "1+1=2");
}

#[tokio::test]
async fn test_unknown_names_and_methods() {
    let server = server();

    let reply = call(&server, "tools/call", json!({"name": "subtract", "arguments": {}})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = call(&server, "resources/read", json!({"uri": "file:///missing"})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = call(&server, "prompts/get", json!({"name": "missing"})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = call(&server, "sampling/createMessage", json!({})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = call(&server, "tools/call", json!({"arguments": {}})).await;
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["error"]["message"], "Missing tool name");

    let reply = call(&server, "resources/read", json!({})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = call(&server, "prompts/get", json!({"arguments": {}})).await;
    assert_eq!(reply["error"]["code"], -32601);

    let reply = server.handle_message(json!({"jsonrpc": "2.0", "id": 9})).await;
    assert_eq!(reply["error"]["code"], -32601);
    assert_eq!(reply["id"], 9);
}

#[tokio::test]
async fn test_resources() {
    let server = server();

    let reply = call(&server, "resources/list", json!({})).await;
    assert_eq!(
        reply["result"]["resources"],
        json!([{
            "uri": "file:///notes.txt",
            "name": "notes",
            "description": "Scratch notes",
            "mimeType": "text/plain"
        }])
    );

    let reply = call(&server, "resources/read", json!({"uri": "file:///notes.txt"})).await;
    let contents = &reply["result"]["contents"][0];
    assert_eq!(contents["uri"], "file:///notes.txt");
    assert_eq!(contents["text"], "remember the milk");
}

#[tokio::test]
async fn test_prompts() {
    let server = server();

    let reply = call(&server, "prompts/list", json!({})).await;
    assert_eq!(
        reply["result"]["prompts"],
        json!([{
            "name": "review",
            "description": "Code review prompt",
            "arguments": [{"name": "language", "required": true}]
        }])
    );

    let reply = call(
        &server,
        "prompts/get",
        json!({"name": "review", "arguments": {"language": "Rust"}}),
    )
    .await;
    assert_eq!(
        reply["result"]["messages"],
        json!([{"role": "user", "content": {"type": "text", "text": "Review this Rust carefully"}}])
    );
}

#[tokio::test]
async fn test_initialized_notification_is_acknowledged() {
    let reply = call(&server(), "notifications/initialized", json!({})).await;
    assert_eq!(reply["result"], json!({}));
}

#[tokio::test]
async fn test_direct_call_surface() {
    let server = server();

    assert_eq!(server.list_tools().len(), 3);
    let result = server.call_tool("add", json!({"a": 2, "b": 3})).await.unwrap();
    assert_eq!(result, ToolResult::text("2+3=5"));

    assert!(matches!(
        server.call_tool("nope", json!({})).await,
        Err(ClaudeError::Mcp(_))
    ));
    assert!(matches!(
        server.call_tool("explode", json!({})).await,
        Err(ClaudeError::Mcp(_))
    ));

    let contents = server.read_resource("file:///notes.txt").await.unwrap();
    assert_eq!(contents.contents[0].text.as_deref(), Some("remember the milk"));

    let prompt = server.get_prompt("review", json!({})).await.unwrap();
    assert_eq!(prompt.messages.len(), 1);
    assert_eq!(server.list_prompts()[0].name, "review");
    assert_eq!(server.list_resources()[0].uri, "file:///notes.txt");
}
