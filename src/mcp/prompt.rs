//! Prompt templates for the SDK MCP server

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::tool::ToolContent;
use super::PromptGenerator;
use crate::error::Result;

/// A named prompt template rendered on `prompts/get`
pub struct SdkMcpPrompt {
    name: String,
    description: Option<String>,
    arguments: Vec<PromptArgument>,
    generator: PromptGenerator,
}

impl SdkMcpPrompt {
    /// Create a new prompt
    pub fn new<F, Fut>(name: impl Into<String>, generator: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PromptResult>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
            generator: Arc::new(move |args| Box::pin(generator(args))),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare an argument
    pub fn argument(mut self, name: impl Into<String>, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: None,
            required: Some(required),
        });
        self
    }

    /// Prompt name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the prompt
    pub async fn render(&self, arguments: Value) -> Result<PromptResult> {
        (self.generator)(arguments).await
    }

    /// Metadata entry for `prompts/list`
    pub fn info(&self) -> PromptInfo {
        PromptInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            arguments: (!self.arguments.is_empty()).then(|| self.arguments.clone()),
        }
    }
}

impl std::fmt::Debug for SdkMcpPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpPrompt")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

/// Declared prompt argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Prompt metadata as listed by `prompts/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInfo {
    /// Prompt name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared arguments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

/// A rendered prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    /// Description of the rendered prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Messages making up the prompt
    pub messages: Vec<PromptMessage>,
}

impl PromptResult {
    /// A prompt made of a single user text message
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            description: None,
            messages: vec![PromptMessage {
                role: "user".to_string(),
                content: ToolContent::Text { text: text.into() },
            }],
        }
    }
}

/// One message of a rendered prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    /// "user" or "assistant"
    pub role: String,
    /// Message content
    pub content: ToolContent,
}
