//! In-process MCP tools
//!
//! Registers a calculator server the CLI can call through `mcp_message`
//! control requests; no separate process is started for it.
//!
//! Run with: cargo run --example tool_server

use claude_agent_control::mcp::{
    PromptResult, ResourceContents, SdkMcpPrompt, SdkMcpResource, SdkMcpServer, SdkMcpTool,
    ToolResult,
};
use claude_agent_control::{ClaudeAgentOptions, ClaudeSDKClient, ContentBlock, Message};
use futures::StreamExt;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn calculator() -> SdkMcpServer {
    SdkMcpServer::new("calc")
        .version("1.0.0")
        .tool(SdkMcpTool::new(
            "add",
            "Add two numbers",
            json!({"a": "number", "b": "number"}),
            |input| async move {
                let a = input["a"].as_f64().unwrap_or(0.0);
                let b = input["b"].as_f64().unwrap_or(0.0);
                Ok(ToolResult::text(format!("{a} + {b} = {}", a + b)))
            },
        ))
        .tool(SdkMcpTool::new(
            "sqrt",
            "Square root of a non-negative number",
            json!({"x": "number"}),
            |input| async move {
                let x = input["x"].as_f64().unwrap_or(0.0);
                if x < 0.0 {
                    return Ok(ToolResult::error("x must be non-negative"));
                }
                Ok(ToolResult::text(format!("{}", x.sqrt())))
            },
        ))
        .resource(
            SdkMcpResource::new("calc://constants", "constants", |uri| async move {
                Ok(ResourceContents::text(uri, "pi=3.14159\ne=2.71828"))
            })
            .mime_type("text/plain"),
        )
        .prompt(
            SdkMcpPrompt::new("explain", |args| async move {
                let topic = args["topic"].as_str().unwrap_or("arithmetic").to_string();
                Ok(PromptResult::user_text(format!("Explain {topic} with one example")))
            })
            .argument("topic", false),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = ClaudeAgentOptions::builder()
        .sdk_mcp_server(calculator())
        .allowed_tools(vec!["mcp__calc__add", "mcp__calc__sqrt"])
        .max_turns(4)
        .build();
    let client = ClaudeSDKClient::new(options, None).await?;

    client
        .query("Use the calc tools to compute sqrt(15 + 27 + 39).", None)
        .await?;

    let mut response = Box::pin(client.receive_response());
    while let Some(message) = response.next().await {
        if let Message::Assistant { message, .. } = message? {
            for block in &message.content {
                match block {
                    ContentBlock::Text { text } => println!("Claude: {text}"),
                    ContentBlock::ToolUse { name, input, .. } => {
                        println!("  [tool] {name} {input}")
                    }
                    _ => {}
                }
            }
        }
    }

    client.close().await;
    Ok(())
}
