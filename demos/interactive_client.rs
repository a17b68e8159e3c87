//! Interactive client example
//!
//! Sends two turns in one session, switches model in between and shows the
//! handshake reply.
//!
//! Run with: cargo run --example interactive_client

use claude_agent_control::{
    ClaudeAgentOptions, ClaudeSDKClient, ContentBlock, Message, PermissionMode,
};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

async fn print_turn(client: &ClaudeSDKClient) -> anyhow::Result<()> {
    let mut response = Box::pin(client.receive_response());
    while let Some(message) = response.next().await {
        match message? {
            Message::Assistant { message, .. } => {
                for block in &message.content {
                    match block {
                        ContentBlock::Text { text } => println!("Claude: {text}"),
                        ContentBlock::ToolUse { name, .. } => println!("  [tool] {name}"),
                        _ => {}
                    }
                }
            }
            Message::Result { num_turns, .. } => println!("--- turn done ({num_turns} turns)\n"),
            _ => {}
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let options = ClaudeAgentOptions::builder()
        .max_turns(3)
        .permission_mode(PermissionMode::Default)
        .build();
    let client = ClaudeSDKClient::new(options, None).await?;

    if let Some(info) = client.server_info() {
        println!("Handshake: {info}\n");
    }

    client.query("Name three prime numbers.", None).await?;
    print_turn(&client).await?;

    client.set_model(Some("claude-sonnet-4-5".to_string())).await?;
    client.query("Now add them up.", None).await?;
    print_turn(&client).await?;

    client.close().await;
    Ok(())
}
