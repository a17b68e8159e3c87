//! One-shot query example
//!
//! Run with: cargo run --example simple_query
//! Set RUST_LOG=claude_agent_control=debug to see the CLI's stderr.

use claude_agent_control::{query, ClaudeAgentOptions, ContentBlock, Message};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Simple Query Example");
    println!("===================\n");

    let options = ClaudeAgentOptions::builder()
        .system_prompt("You are a helpful math tutor. Be concise.")
        .max_turns(1)
        .build();

    let stream = query("What is 2 + 2?", Some(options)).await?;
    let mut stream = Box::pin(stream);

    while let Some(message) = stream.next().await {
        match message? {
            Message::Assistant { message, .. } => {
                for block in &message.content {
                    if let ContentBlock::Text { text } = block {
                        println!("Claude: {text}");
                    }
                }
            }
            Message::Result {
                total_cost_usd,
                num_turns,
                ..
            } => {
                println!("\n---");
                println!("Completed in {num_turns} turns");
                if let Some(cost) = total_cost_usd {
                    println!("Cost: ${cost:.4}");
                }
            }
            _ => {}
        }
    }

    Ok(())
}
