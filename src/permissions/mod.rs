//! Permission system for tool access control
//!
//! Provides helpers for building `can_use_tool` callbacks, a small policy
//! wrapper with allow/deny lists, and the conversion of a [`PermissionResult`]
//! into the response body the CLI expects.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{
    CanUseToolCallback, PermissionResult, PermissionResultDeny, ToolName, ToolPermissionContext,
};

/// Permission policy: deny list, optional allow list, then an optional callback
#[derive(Default)]
pub struct PermissionManager {
    callback: Option<CanUseToolCallback>,
    allowed_tools: Option<Vec<ToolName>>,
    disallowed_tools: Vec<ToolName>,
}

impl PermissionManager {
    /// Create a new permission manager that allows everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission callback consulted after the lists
    pub fn with_callback(mut self, callback: CanUseToolCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Only allow these tools
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.allowed_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Always deny these tools
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Check if a tool can be used
    pub async fn can_use_tool(
        &self,
        tool_name: ToolName,
        tool_input: Value,
        context: ToolPermissionContext,
    ) -> Result<PermissionResult> {
        if self.disallowed_tools.contains(&tool_name) {
            return Ok(PermissionResult::deny(format!(
                "Tool {} is disallowed",
                tool_name.as_str()
            )));
        }

        if let Some(ref allowed) = self.allowed_tools {
            if !allowed.contains(&tool_name) {
                return Ok(PermissionResult::deny(format!(
                    "Tool {} is not in allowed list",
                    tool_name.as_str()
                )));
            }
        }

        match self.callback {
            Some(ref callback) => callback(tool_name, tool_input, context).await,
            None => Ok(PermissionResult::allow()),
        }
    }

    /// Turn the policy into a callback for [`ClaudeAgentOptions::can_use_tool`](crate::ClaudeAgentOptions)
    pub fn into_callback(self) -> CanUseToolCallback {
        let manager = Arc::new(self);
        Arc::new(move |tool_name, tool_input, context| {
            let manager = manager.clone();
            Box::pin(async move { manager.can_use_tool(tool_name, tool_input, context).await })
        })
    }

    /// Create a permission callback from a closure
    pub fn callback<F, Fut>(f: F) -> CanUseToolCallback
    where
        F: Fn(ToolName, Value, ToolPermissionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<PermissionResult>> + Send + 'static,
    {
        Arc::new(move |tool_name, tool_input, context| Box::pin(f(tool_name, tool_input, context)))
    }
}

/// Response body for a `can_use_tool` request
///
/// An allow without replacement input echoes the original input back.
pub fn permission_response(result: &PermissionResult, original_input: &Value) -> Value {
    match result {
        PermissionResult::Allow(allow) => {
            let mut body = json!({
                "behavior": "allow",
                "updatedInput": allow.updated_input.clone().unwrap_or_else(|| original_input.clone()),
            });
            if let Some(ref updates) = allow.updated_permissions {
                body["updatedPermissions"] = json!(updates);
            }
            body
        }
        PermissionResult::Deny(PermissionResultDeny { message, interrupt }) => {
            let mut body = json!({
                "behavior": "deny",
                "message": message,
            });
            if *interrupt {
                body["interrupt"] = json!(true);
            }
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        PermissionMode, PermissionResultAllow, PermissionUpdate, PermissionUpdateDestination,
    };

    #[tokio::test]
    async fn test_lists_take_precedence() {
        let manager = PermissionManager::new()
            .allowed_tools(vec!["Read", "Bash"])
            .disallowed_tools(vec!["Bash"]);

        let denied = manager
            .can_use_tool("Bash".into(), json!({}), ToolPermissionContext::default())
            .await
            .unwrap();
        assert!(matches!(denied, PermissionResult::Deny(_)));

        let not_listed = manager
            .can_use_tool("Write".into(), json!({}), ToolPermissionContext::default())
            .await
            .unwrap();
        assert!(matches!(not_listed, PermissionResult::Deny(_)));

        let allowed = manager
            .can_use_tool("Read".into(), json!({}), ToolPermissionContext::default())
            .await
            .unwrap();
        assert!(matches!(allowed, PermissionResult::Allow(_)));
    }

    #[tokio::test]
    async fn test_into_callback_consults_closure() {
        let callback = PermissionManager::new()
            .with_callback(PermissionManager::callback(|tool, _input, _ctx| async move {
                Ok(PermissionResult::deny(format!("no {}", tool.as_str())))
            }))
            .into_callback();
        let result = callback("Edit".into(), json!({}), ToolPermissionContext::default())
            .await
            .unwrap();
        assert_eq!(result, PermissionResult::deny("no Edit"));
    }

    #[test]
    fn test_allow_echoes_original_input() {
        let body = permission_response(&PermissionResult::allow(), &json!({"command": "ls"}));
        assert_eq!(body, json!({"behavior": "allow", "updatedInput": {"command": "ls"}}));
    }

    #[test]
    fn test_allow_with_updates() {
        let result = PermissionResult::Allow(PermissionResultAllow {
            updated_input: Some(json!({"command": "ls -la"})),
            updated_permissions: Some(vec![PermissionUpdate::SetMode {
                mode: PermissionMode::AcceptEdits,
                destination: Some(PermissionUpdateDestination::Session),
            }]),
        });
        let body = permission_response(&result, &json!({"command": "ls"}));
        assert_eq!(body["updatedInput"], json!({"command": "ls -la"}));
        assert_eq!(
            body["updatedPermissions"],
            json!([{"type": "setMode", "mode": "acceptEdits", "destination": "session"}])
        );
    }

    #[test]
    fn test_deny_shape() {
        let body = permission_response(&PermissionResult::deny("nope"), &json!({}));
        assert_eq!(body, json!({"behavior": "deny", "message": "nope"}));

        let interrupting = PermissionResult::Deny(PermissionResultDeny {
            message: "stop".into(),
            interrupt: true,
        });
        assert_eq!(permission_response(&interrupting, &json!({}))["interrupt"], true);
    }
}
