//! Hooks and permission callbacks
//!
//! A `PreToolUse` hook blocks destructive shell commands, and a permission
//! callback only lets read-only tools through without asking.
//!
//! Run with: cargo run --example hooks_and_permissions

use claude_agent_control::hooks::HookMatcherBuilder;
use claude_agent_control::{
    ClaudeAgentOptions, ClaudeSDKClient, HookDecision, HookEvent, HookInput, HookManager,
    HookOutput, Message, PermissionManager, PermissionResult,
};
use futures::StreamExt;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let guard_bash = HookManager::callback(|input, _tool_use_id, _context| async move {
        let HookInput::PreToolUse(pre) = input else {
            return Ok(HookOutput::default());
        };
        let command = pre.tool_input["command"].as_str().unwrap_or_default();
        if command.contains("rm -rf") {
            println!("  [hook] blocked: {command}");
            return Ok(HookOutput {
                decision: Some(HookDecision::Block),
                reason: Some("Destructive commands are not allowed".to_string()),
                ..Default::default()
            });
        }
        println!("  [hook] allowed: {command}");
        Ok(HookOutput::default())
    });

    let mut hooks = HashMap::new();
    hooks.insert(
        HookEvent::PreToolUse,
        vec![HookMatcherBuilder::new(Some("Bash"))
            .add_hook(guard_bash)
            .timeout(30)
            .build()],
    );

    let can_use_tool = PermissionManager::new()
        .disallowed_tools(vec!["WebFetch"])
        .with_callback(PermissionManager::callback(|tool, _input, context| async move {
            match tool.as_str() {
                "Read" | "Glob" | "Grep" | "Bash" => Ok(PermissionResult::allow()),
                other => {
                    println!(
                        "  [permission] denied {other} ({} suggestions)",
                        context.suggestions.len()
                    );
                    Ok(PermissionResult::deny(format!("{other} needs manual approval")))
                }
            }
        }))
        .into_callback();

    let options = ClaudeAgentOptions::builder()
        .hooks(hooks)
        .can_use_tool(can_use_tool)
        .max_turns(3)
        .build();
    let client = ClaudeSDKClient::new(options, None).await?;

    client
        .query("List the files here, then delete the target directory.", None)
        .await?;

    let mut response = Box::pin(client.receive_response());
    while let Some(message) = response.next().await {
        if let Message::Result { result, .. } = message? {
            println!("Result: {}", result.unwrap_or_default());
        }
    }

    client.close().await;
    Ok(())
}
