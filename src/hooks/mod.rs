//! Hook system for intercepting agent events
//!
//! Hooks are registered per [`HookEvent`] as matchers. During the initialize
//! handshake every callback gets a unique id (`hook_0`, `hook_1`, ...); the CLI
//! evaluates matchers itself and calls back by id through `hook_callback`
//! control requests.

mod input;

pub use input::{
    BaseHookInput, HookInput, PostToolUseHookInput, PreCompactHookInput, PreToolUseHookInput,
    StopHookInput, UserPromptSubmitHookInput,
};

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ClaudeError, Result};
use crate::types::{HookCallback, HookContext, HookEvent, HookMatcher, HookOutput};

/// Registry of hook callbacks keyed by callback id
#[derive(Default)]
pub struct HookManager {
    callbacks: HashMap<String, HookCallback>,
}

impl HookManager {
    /// Create an empty hook manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign callback ids and build the `hooks` object sent with `initialize`
    ///
    /// Events are visited in a fixed order so ids are stable across runs.
    /// Returns `None` for the config when no hooks are configured.
    pub fn from_config(hooks: &HashMap<HookEvent, Vec<HookMatcher>>) -> (Self, Option<Value>) {
        let mut manager = Self::new();
        let mut config = serde_json::Map::new();

        let mut events: Vec<_> = hooks.keys().copied().collect();
        events.sort();

        for event in events {
            let Some(matchers) = hooks.get(&event) else {
                continue;
            };
            if matchers.is_empty() {
                continue;
            }
            let entries: Vec<Value> = matchers
                .iter()
                .map(|matcher| {
                    let ids: Vec<String> = matcher
                        .hooks
                        .iter()
                        .map(|hook| manager.register(hook.clone()))
                        .collect();
                    let mut entry = json!({
                        "matcher": matcher.matcher,
                        "hookCallbackIds": ids,
                    });
                    if let Some(timeout) = matcher.timeout {
                        entry["timeout"] = json!(timeout);
                    }
                    entry
                })
                .collect();
            config.insert(event.as_str().to_string(), Value::Array(entries));
        }

        let config = (!config.is_empty()).then_some(Value::Object(config));
        (manager, config)
    }

    /// Register a callback and return its id
    pub fn register(&mut self, callback: HookCallback) -> String {
        let id = format!("hook_{}", self.callbacks.len());
        self.callbacks.insert(id.clone(), callback);
        id
    }

    /// Number of registered callbacks
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no callbacks are registered
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Whether a callback id is known
    pub fn contains(&self, callback_id: &str) -> bool {
        self.callbacks.contains_key(callback_id)
    }

    /// Invoke the callback registered under `callback_id`
    ///
    /// # Errors
    /// `ClaudeError::Hook` for an unknown id; callback errors are returned unchanged
    pub async fn invoke(
        &self,
        callback_id: &str,
        input: HookInput,
        tool_use_id: Option<String>,
        context: HookContext,
    ) -> Result<HookOutput> {
        let callback = self
            .callbacks
            .get(callback_id)
            .ok_or_else(|| ClaudeError::hook(format!("No hook callback found for ID: {callback_id}")))?;
        callback(input, tool_use_id, context).await
    }

    /// Create a hook callback from a closure
    pub fn callback<F, Fut>(f: F) -> HookCallback
    where
        F: Fn(HookInput, Option<String>, HookContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<HookOutput>> + Send + 'static,
    {
        Arc::new(move |input, tool_use_id, context| Box::pin(f(input, tool_use_id, context)))
    }
}

impl std::fmt::Debug for HookManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.callbacks.keys().collect();
        ids.sort();
        f.debug_struct("HookManager").field("callbacks", &ids).finish()
    }
}

/// Builder for creating hook matchers
pub struct HookMatcherBuilder {
    matcher: Option<String>,
    hooks: Vec<HookCallback>,
    timeout: Option<u64>,
}

impl HookMatcherBuilder {
    /// Create a new hook matcher builder
    ///
    /// # Arguments
    /// * `pattern` - Matcher pattern (None for all, or a tool name / `Write|Edit` pattern)
    pub fn new(pattern: Option<impl Into<String>>) -> Self {
        Self {
            matcher: pattern.map(|p| p.into()),
            hooks: Vec::new(),
            timeout: None,
        }
    }

    /// Add a hook callback
    pub fn add_hook(mut self, hook: HookCallback) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Timeout in seconds the CLI applies to these hooks
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    /// Build the hook matcher
    pub fn build(self) -> HookMatcher {
        HookMatcher {
            matcher: self.matcher,
            hooks: self.hooks,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HookDecision;

    fn noop() -> HookCallback {
        HookManager::callback(|_input, _tool_use_id, _context| async { Ok(HookOutput::default()) })
    }

    #[test]
    fn test_from_config_assigns_unique_ids() {
        let mut hooks = HashMap::new();
        hooks.insert(
            HookEvent::PreToolUse,
            vec![
                HookMatcherBuilder::new(Some("Bash"))
                    .add_hook(noop())
                    .add_hook(noop())
                    .timeout(30)
                    .build(),
                HookMatcherBuilder::new(None::<String>).add_hook(noop()).build(),
            ],
        );
        hooks.insert(
            HookEvent::Stop,
            vec![HookMatcherBuilder::new(None::<String>).add_hook(noop()).build()],
        );

        let (manager, config) = HookManager::from_config(&hooks);
        let config = config.unwrap();
        assert_eq!(manager.len(), 4);

        let pre = &config["PreToolUse"];
        assert_eq!(pre[0]["matcher"], "Bash");
        assert_eq!(pre[0]["hookCallbackIds"], json!(["hook_0", "hook_1"]));
        assert_eq!(pre[0]["timeout"], 30);
        assert_eq!(pre[1]["matcher"], Value::Null);
        assert!(pre[1].get("timeout").is_none());
        assert_eq!(config["Stop"][0]["hookCallbackIds"], json!(["hook_3"]));
    }

    #[test]
    fn test_empty_config_is_none() {
        let (manager, config) = HookManager::from_config(&HashMap::new());
        assert!(manager.is_empty());
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_invoke_by_id() {
        let mut manager = HookManager::new();
        let id = manager.register(HookManager::callback(|input, _, _| async move {
            Ok(HookOutput {
                decision: Some(HookDecision::Block),
                reason: input.tool_name().map(|t| format!("{t} blocked")),
                ..Default::default()
            })
        }));

        let input = HookInput::from_value(json!({
            "hook_event_name": "PreToolUse",
            "tool_name": "Bash",
            "tool_input": {}
        }));
        let output = manager
            .invoke(&id, input.clone(), None, HookContext::default())
            .await
            .unwrap();
        assert_eq!(output.reason.as_deref(), Some("Bash blocked"));

        let err = manager
            .invoke("hook_99", input, None, HookContext::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("hook_99"));
    }
}
