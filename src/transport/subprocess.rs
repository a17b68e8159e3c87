//! Transport that runs the Claude Code CLI as a child process

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;

use crate::error::{ClaudeError, Result};
use crate::transport::codec::{JsonLineCodec, DEFAULT_MAX_BUFFER_SIZE};
use crate::types::{ClaudeAgentOptions, McpServerConfig, McpServers, SystemPrompt};
use crate::{Transport, VERSION};

/// Entrypoint reported to the CLI for one-shot queries
pub const ENTRYPOINT_QUERY: &str = "sdk-rust";
/// Entrypoint reported to the CLI for interactive clients
pub const ENTRYPOINT_CLIENT: &str = "sdk-rust-client";

const STDERR_TAIL_LINES: usize = 100;
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(5);
const STDERR_DRAIN_WAIT: Duration = Duration::from_millis(500);

// Never forwarded to the child
const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

// Only these keys from `extra_args` reach the command line
const ALLOWED_EXTRA_FLAGS: &[&str] = &[
    "timeout",
    "retries",
    "log-level",
    "cache-dir",
    "debug-to-stderr",
    "betas",
    "max-thinking-tokens",
];

/// Prompt input type
#[derive(Debug, Clone)]
pub enum PromptInput {
    /// Single string prompt, passed on the command line
    String(String),
    /// Stream of JSON messages written to stdin
    Stream,
}

impl From<String> for PromptInput {
    fn from(s: String) -> Self {
        PromptInput::String(s)
    }
}

impl From<&str> for PromptInput {
    fn from(s: &str) -> Self {
        PromptInput::String(s.to_string())
    }
}

/// Lifecycle of a [`SubprocessTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, not yet spawned
    Unconnected,
    /// Spawn in progress
    Connecting,
    /// Process running, writes accepted
    Ready,
    /// Shutdown in progress
    Closing,
    /// Shut down
    Closed,
    /// A write failed; writes are rejected but buffered reads stay drainable
    Faulted,
}

/// Child-process transport speaking stream-json over stdio
pub struct SubprocessTransport {
    prompt: PromptInput,
    options: ClaudeAgentOptions,
    cli_path: Option<PathBuf>,
    entrypoint: String,
    state: TransportState,
    fault: Option<String>,
    process: Arc<Mutex<Option<Child>>>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr_tail: Arc<std::sync::Mutex<VecDeque<String>>>,
    stderr_done: Option<oneshot::Receiver<()>>,
    max_buffer_size: usize,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl SubprocessTransport {
    /// Prepare a transport; nothing is spawned until `connect`
    ///
    /// # Arguments
    /// * `prompt` - The prompt input (string or stream)
    /// * `options` - Configuration options
    /// * `cli_path` - Optional path to Claude Code CLI (searched for on connect if None)
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the options fail validation
    pub fn new(
        prompt: PromptInput,
        options: ClaudeAgentOptions,
        cli_path: Option<PathBuf>,
    ) -> Result<Self> {
        options.validate()?;
        let max_buffer_size = options.max_buffer_size.unwrap_or(DEFAULT_MAX_BUFFER_SIZE);

        Ok(Self {
            prompt,
            options,
            cli_path,
            entrypoint: ENTRYPOINT_QUERY.to_string(),
            state: TransportState::Unconnected,
            fault: None,
            process: Arc::new(Mutex::new(None)),
            stdin: None,
            stdout: None,
            stderr_tail: Arc::new(std::sync::Mutex::new(VecDeque::new())),
            stderr_done: None,
            max_buffer_size,
            reader_task: None,
            stderr_task: None,
        })
    }

    /// Set the entrypoint tag exported to the child as `CLAUDE_CODE_ENTRYPOINT`
    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = entrypoint.into();
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Locate the `claude` executable on PATH or in common install paths
    pub fn find_cli() -> Result<PathBuf> {
        if let Ok(path) = which::which("claude") {
            return Ok(path);
        }

        let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
        let locations = vec![
            PathBuf::from(&home).join(".npm-global/bin/claude"),
            PathBuf::from("/usr/local/bin/claude"),
            PathBuf::from(&home).join(".local/bin/claude"),
            PathBuf::from(&home).join("node_modules/.bin/claude"),
            PathBuf::from(&home).join(".yarn/bin/claude"),
            PathBuf::from(&home).join(".claude/local/claude"),
        ];

        for path in locations {
            if path.is_file() {
                return Ok(path);
            }
        }

        Err(ClaudeError::cli_not_found())
    }

    fn resolve_cli(&self) -> Result<PathBuf> {
        match &self.cli_path {
            Some(path) if path.exists() => Ok(path.clone()),
            Some(path) => Err(ClaudeError::CliNotFound(format!(
                "Claude Code not found at: {}",
                path.display()
            ))),
            None => Self::find_cli(),
        }
    }

    /// Command-line arguments derived from the options and prompt mode
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
        ];

        if let Some(ref system_prompt) = self.options.system_prompt {
            match system_prompt {
                SystemPrompt::String(s) => {
                    args.push("--system-prompt".into());
                    args.push(s.clone());
                }
                SystemPrompt::Preset(preset) => {
                    if let Some(ref append) = preset.append {
                        args.push("--append-system-prompt".into());
                        args.push(append.clone());
                    }
                }
            }
        }

        if !self.options.allowed_tools.is_empty() {
            let tools: Vec<&str> = self.options.allowed_tools.iter().map(|t| t.as_str()).collect();
            args.push("--allowedTools".into());
            args.push(tools.join(","));
        }

        if let Some(max_turns) = self.options.max_turns {
            args.push("--max-turns".into());
            args.push(max_turns.to_string());
        }

        if !self.options.disallowed_tools.is_empty() {
            let tools: Vec<&str> = self
                .options
                .disallowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect();
            args.push("--disallowedTools".into());
            args.push(tools.join(","));
        }

        if let Some(ref model) = self.options.model {
            args.push("--model".into());
            args.push(model.clone());
        }

        if let Some(ref tool) = self.options.permission_prompt_tool_name {
            args.push("--permission-prompt-tool".into());
            args.push(tool.clone());
        }

        if let Some(mode) = self.options.permission_mode {
            args.push("--permission-mode".into());
            args.push(mode.as_str().into());
        }

        if self.options.continue_conversation {
            args.push("--continue".into());
        }

        if let Some(ref session_id) = self.options.resume {
            args.push("--resume".into());
            args.push(session_id.as_str().into());
        }

        if let Some(ref settings) = self.options.settings {
            args.push("--settings".into());
            args.push(settings.to_string_lossy().into_owned());
        }

        for dir in &self.options.add_dirs {
            args.push("--add-dir".into());
            args.push(dir.to_string_lossy().into_owned());
        }

        match &self.options.mcp_servers {
            McpServers::Dict(servers) if !servers.is_empty() => {
                let config_map: HashMap<&String, serde_json::Value> = servers
                    .iter()
                    .map(|(name, config)| (name, Self::serialize_mcp_config(config)))
                    .collect();
                args.push("--mcp-config".into());
                args.push(serde_json::json!({ "mcpServers": config_map }).to_string());
            }
            McpServers::Path(path) => {
                args.push("--mcp-config".into());
                args.push(path.to_string_lossy().into_owned());
            }
            _ => {}
        }

        if self.options.include_partial_messages {
            args.push("--include-partial-messages".into());
        }

        if self.options.fork_session {
            args.push("--fork-session".into());
        }

        if let Some(ref agents) = self.options.agents {
            args.push("--agents".into());
            args.push(serde_json::to_string(agents).unwrap_or_default());
        }

        let sources = self
            .options
            .setting_sources
            .as_ref()
            .map(|s| s.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        args.push("--setting-sources".into());
        args.push(sources);

        let mut extra: Vec<_> = self.options.extra_args.iter().collect();
        extra.sort_by(|a, b| a.0.cmp(b.0));
        for (flag, value) in extra {
            if !ALLOWED_EXTRA_FLAGS.contains(&flag.as_str()) {
                tracing::warn!(flag = %flag, "Ignoring extra CLI flag not in allowlist");
                continue;
            }
            args.push(format!("--{flag}"));
            if let Some(v) = value {
                args.push(v.clone());
            }
        }

        match &self.prompt {
            PromptInput::Stream => {
                args.push("--input-format".into());
                args.push("stream-json".into());
            }
            PromptInput::String(s) => {
                args.push("--print".into());
                args.push("--".into());
                args.push(s.clone());
            }
        }

        args
    }

    /// One `--mcp-config` entry
    fn serialize_mcp_config(config: &McpServerConfig) -> serde_json::Value {
        match config {
            McpServerConfig::Stdio(stdio) => {
                let mut obj = serde_json::json!({
                    "command": stdio.command,
                });
                if let Some(ref args) = stdio.args {
                    obj["args"] = serde_json::json!(args);
                }
                if let Some(ref env) = stdio.env {
                    obj["env"] = serde_json::json!(env);
                }
                if let Some(ref server_type) = stdio.server_type {
                    obj["type"] = serde_json::json!(server_type);
                }
                obj
            }
            McpServerConfig::Sse(sse) => serde_json::json!({
                "type": sse.server_type,
                "url": sse.url,
                "headers": sse.headers,
            }),
            McpServerConfig::Http(http) => serde_json::json!({
                "type": http.server_type,
                "url": http.url,
                "headers": http.headers,
            }),
            McpServerConfig::Sdk(sdk) => serde_json::json!({
                "type": "sdk",
                "name": sdk.name(),
            }),
        }
    }

    fn process_env(&self) -> HashMap<String, String> {
        let mut process_env = env::vars().collect::<HashMap<_, _>>();

        for (key, value) in &self.options.env {
            if DANGEROUS_ENV_VARS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Refusing to override protected environment variable");
                continue;
            }
            process_env.insert(key.clone(), value.clone());
        }

        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), self.entrypoint.clone());
        process_env.insert("CLAUDE_AGENT_SDK_VERSION".to_string(), VERSION.to_string());

        if self.options.enable_file_checkpointing {
            process_env.insert(
                "CLAUDE_CODE_ENABLE_SDK_FILE_CHECKPOINTING".to_string(),
                "true".to_string(),
            );
        }

        if let Some(ref cwd) = self.options.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
        }

        process_env
    }

    async fn spawn(&mut self) -> Result<()> {
        let cli_path = self.resolve_cli()?;

        if let Some(ref cwd) = self.options.cwd {
            if !cwd.exists() {
                return Err(ClaudeError::connection(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                )));
            }
        }

        let mut cmd = Command::new(&cli_path);
        cmd.args(self.build_args());
        cmd.env_clear().envs(self.process_env());
        if let Some(ref cwd) = self.options.cwd {
            cmd.current_dir(cwd);
        }

        // stderr is piped so the child never touches the parent's terminal
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(cli = %cli_path.display(), entrypoint = %self.entrypoint, "Spawning Claude Code");

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClaudeError::CliNotFound(format!(
                    "Claude Code not found at: {}",
                    cli_path.display()
                ))
            } else {
                ClaudeError::connection(format!("Failed to start Claude Code: {e}"))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stderr handle"))?;

        let tail = self.stderr_tail.clone();
        let callback = self.options.stderr.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(target: "claude_agent_control::cli_stderr", "{line}");
                if let Some(ref cb) = callback {
                    cb(line.clone());
                }
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            let _ = done_tx.send(());
        });

        *self.process.lock().await = Some(child);
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr_task = Some(stderr_task);
        self.stderr_done = Some(done_rx);

        if matches!(self.prompt, PromptInput::String(_)) {
            if let Some(mut stdin) = self.stdin.take() {
                let _ = stdin.shutdown().await;
            }
        }

        Ok(())
    }

    fn exited_with(&self) -> Option<i32> {
        let mut guard = self.process.try_lock().ok()?;
        let child = guard.as_mut()?;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            _ => None,
        }
    }
}

#[async_trait]
impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        match self.state {
            TransportState::Unconnected => {}
            TransportState::Ready => return Ok(()),
            other => {
                return Err(ClaudeError::connection(format!(
                    "Cannot connect transport in state {other:?}"
                )))
            }
        }

        self.state = TransportState::Connecting;
        match self.spawn().await {
            Ok(()) => {
                self.state = TransportState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = TransportState::Unconnected;
                Err(e)
            }
        }
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        match self.state {
            TransportState::Ready => {}
            TransportState::Faulted => {
                let reason = self.fault.clone().unwrap_or_default();
                return Err(ClaudeError::connection(reason));
            }
            _ => {
                return Err(ClaudeError::connection(
                    "Transport is not ready for writing",
                ))
            }
        }

        if let Some(code) = self.exited_with() {
            return Err(ClaudeError::connection(format!(
                "Cannot write to terminated process (exit code: {code})"
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ClaudeError::connection("stdin not available"))?;

        let outcome = match stdin.write_all(data.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };

        if let Err(e) = outcome {
            let reason = format!("Failed to write to process stdin: {e}");
            tracing::warn!(error = %e, "Transport write failed");
            self.state = TransportState::Faulted;
            self.fault = Some(reason.clone());
            return Err(ClaudeError::connection(reason));
        }

        Ok(())
    }

    async fn end_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| ClaudeError::connection(format!("Failed to close stdin: {e}")))?;
        }
        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let Some(stdout) = self.stdout.take() else {
            let _ = tx.send(Err(ClaudeError::connection(
                "Not connected - stdout not available",
            )));
            return rx;
        };

        let process = self.process.clone();
        let tail = self.stderr_tail.clone();
        let stderr_done = self.stderr_done.take();
        let max_buffer_size = self.max_buffer_size;

        let task = tokio::spawn(async move {
            let mut frames = FramedRead::new(stdout, JsonLineCodec::new(max_buffer_size));

            while let Some(item) = frames.next().await {
                match item {
                    Ok(frame) => {
                        if tx.send(frame).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ClaudeError::Io(e)));
                        break;
                    }
                }
            }

            let child = process.lock().await.take();
            let Some(mut child) = child else {
                return;
            };

            match child.wait().await {
                Ok(status) if !status.success() => {
                    if let Some(done) = stderr_done {
                        let _ = tokio::time::timeout(STDERR_DRAIN_WAIT, done).await;
                    }
                    let stderr = tail
                        .lock()
                        .ok()
                        .map(|t| t.iter().cloned().collect::<Vec<_>>().join("\n"))
                        .filter(|s| !s.is_empty());
                    let code = status.code().unwrap_or(-1);
                    tracing::debug!(exit_code = code, "Claude Code exited with failure");
                    let _ = tx.send(Err(ClaudeError::process("Command failed", code, stderr)));
                }
                Ok(_) => {
                    tracing::debug!("Claude Code exited");
                }
                Err(e) => {
                    let _ = tx.send(Err(ClaudeError::Io(e)));
                }
            }
        });

        self.reader_task = Some(task);
        rx
    }

    fn is_ready(&self) -> bool {
        self.state == TransportState::Ready
    }

    async fn close(&mut self) {
        if self.state == TransportState::Closed {
            return;
        }
        self.state = TransportState::Closing;

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        self.stdout = None;

        let child = self.process.lock().await.take();
        if let Some(mut child) = child {
            match tokio::time::timeout(CLOSE_GRACE_PERIOD, child.wait()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Failed to wait for Claude Code");
                }
                Err(_) => {
                    tracing::debug!("Claude Code did not exit in time, killing it");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
        }

        self.state = TransportState::Closed;
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        if let Ok(mut guard) = self.process.try_lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{McpStdioServerConfig, PermissionMode};

    fn transport(prompt: PromptInput, options: ClaudeAgentOptions) -> SubprocessTransport {
        SubprocessTransport::new(prompt, options, Some(PathBuf::from("/bin/sh"))).unwrap()
    }

    #[test]
    fn test_prompt_input_conversions() {
        assert!(matches!(PromptInput::from("hello"), PromptInput::String(_)));
        assert!(matches!(
            PromptInput::from(String::from("world")),
            PromptInput::String(_)
        ));
    }

    #[test]
    fn test_streaming_args() {
        let options = ClaudeAgentOptions::builder()
            .model("claude-sonnet")
            .permission_mode(PermissionMode::AcceptEdits)
            .allowed_tools(vec!["Read", "Write"])
            .max_turns(3)
            .build();
        let args = transport(PromptInput::Stream, options).build_args();
        let joined = args.join(" ");
        assert!(joined.starts_with("--output-format stream-json --verbose"));
        assert!(joined.contains("--allowedTools Read,Write"));
        assert!(joined.contains("--max-turns 3"));
        assert!(joined.contains("--permission-mode acceptEdits"));
        assert!(joined.ends_with("--input-format stream-json"));
        assert!(!args.contains(&"--print".to_string()));
    }

    #[test]
    fn test_string_prompt_args() {
        let args = transport("hi there".into(), ClaudeAgentOptions::default()).build_args();
        let n = args.len();
        assert_eq!(&args[n - 3..], &["--print", "--", "hi there"]);
    }

    #[test]
    fn test_sdk_servers_serialize_by_name() {
        let options = ClaudeAgentOptions::builder()
            .sdk_mcp_server(crate::mcp::SdkMcpServer::new("calc"))
            .add_mcp_server(
                "fs",
                McpServerConfig::Stdio(McpStdioServerConfig {
                    server_type: None,
                    command: "fs-server".into(),
                    args: Some(vec!["--root".into()]),
                    env: None,
                }),
            )
            .build();
        let args = transport(PromptInput::Stream, options).build_args();
        let pos = args.iter().position(|a| a == "--mcp-config").unwrap();
        let config: serde_json::Value = serde_json::from_str(&args[pos + 1]).unwrap();
        assert_eq!(
            config["mcpServers"]["calc"],
            serde_json::json!({"type": "sdk", "name": "calc"})
        );
        assert_eq!(config["mcpServers"]["fs"]["command"], "fs-server");
    }

    #[test]
    fn test_extra_args_respect_allowlist() {
        let options = ClaudeAgentOptions::builder()
            .extra_arg("debug-to-stderr", None)
            .extra_arg("dangerously-skip-permissions", None)
            .build();
        let args = transport(PromptInput::Stream, options).build_args();
        assert!(args.contains(&"--debug-to-stderr".to_string()));
        assert!(!args.contains(&"--dangerously-skip-permissions".to_string()));
    }

    #[test]
    fn test_env_blocks_dangerous_vars_and_sets_entrypoint() {
        let options = ClaudeAgentOptions::builder()
            .env("LD_PRELOAD", "/tmp/evil.so")
            .env("MY_VAR", "1")
            .enable_file_checkpointing(true)
            .build();
        let t = transport(PromptInput::Stream, options).with_entrypoint(ENTRYPOINT_CLIENT);
        let env = t.process_env();
        assert_ne!(env.get("LD_PRELOAD").map(String::as_str), Some("/tmp/evil.so"));
        assert_eq!(env.get("MY_VAR").map(String::as_str), Some("1"));
        assert_eq!(
            env.get("CLAUDE_CODE_ENTRYPOINT").map(String::as_str),
            Some(ENTRYPOINT_CLIENT)
        );
        assert_eq!(
            env.get("CLAUDE_CODE_ENABLE_SDK_FILE_CHECKPOINTING")
                .map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let options = ClaudeAgentOptions::builder().max_turns(100_000).build();
        assert!(SubprocessTransport::new(PromptInput::Stream, options, None).is_err());
    }
}
