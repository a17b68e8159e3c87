//! One-shot prompts without a control channel

use futures::{Stream, StreamExt};
use std::path::PathBuf;

use crate::control::{Query, QueryConfig};
use crate::error::Result;
use crate::transport::{PromptInput, SubprocessTransport};
use crate::types::{ClaudeAgentOptions, Message};
use crate::Transport;

/// Run a single prompt and stream the conversation back
///
/// The prompt travels on the command line (`--print`) and stdin is closed
/// right away, so there is no control channel: no interrupts, hooks, model
/// switches or permission callbacks. Use
/// [`ClaudeSDKClient`](crate::ClaudeSDKClient) when any of those are needed.
///
/// The CLI is shut down once the returned stream has been drained.
///
/// # Arguments
/// * `prompt` - Text of the single turn
/// * `options` - Session options (`ClaudeAgentOptions::default()` if None)
///
/// # Returns
/// A stream of messages; a non-zero CLI exit is its last item
///
/// # Errors
/// - `InvalidConfig` when the options fail validation
/// - `CliNotFound` when no executable is found
/// - `Connection` when the process cannot be started
///
/// # Examples
///
/// ```no_run
/// use claude_agent_control::{query, ClaudeAgentOptions};
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let options = ClaudeAgentOptions::builder()
///         .system_prompt("Answer with code only")
///         .max_turns(1)
///         .build();
///
///     let stream = query("Print the first ten primes in Rust", Some(options)).await?;
///     let mut stream = Box::pin(stream);
///
///     while let Some(message) = stream.next().await {
///         println!("{:?}", message?);
///     }
///     Ok(())
/// }
/// ```
pub async fn query(
    prompt: impl Into<String>,
    options: Option<ClaudeAgentOptions>,
) -> Result<impl Stream<Item = Result<Message>> + Send> {
    query_with_cli(prompt, options, None).await
}

/// [`query`] with an explicit CLI executable
pub async fn query_with_cli(
    prompt: impl Into<String>,
    options: Option<ClaudeAgentOptions>,
    cli_path: Option<PathBuf>,
) -> Result<impl Stream<Item = Result<Message>> + Send> {
    let options = options.unwrap_or_default();
    let config = QueryConfig::from_options(&options, false);

    let mut transport =
        SubprocessTransport::new(PromptInput::from(prompt.into()), options, cli_path)?;
    transport.connect().await?;

    let engine = Query::new(Box::new(transport), config);
    engine.start().await;

    Ok(async_stream::stream! {
        let mut messages = Box::pin(engine.receive_messages());
        while let Some(message) = messages.next().await {
            yield message;
        }
        // The stream owns the engine; shut the process down once drained
        engine.close().await;
    })
}
