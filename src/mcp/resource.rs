//! Resource definitions for the SDK MCP server

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

use super::ResourceReader;
use crate::error::Result;

/// A readable resource identified by URI
pub struct SdkMcpResource {
    uri: String,
    name: String,
    description: Option<String>,
    mime_type: Option<String>,
    reader: ResourceReader,
}

impl SdkMcpResource {
    /// Create a new resource
    pub fn new<F, Fut>(uri: impl Into<String>, name: impl Into<String>, reader: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ResourceContents>> + Send + 'static,
    {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
            reader: Arc::new(move |uri| Box::pin(reader(uri))),
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the MIME type
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Resource URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Read the resource
    pub async fn read(&self) -> Result<ResourceContents> {
        (self.reader)(self.uri.clone()).await
    }

    /// Metadata entry for `resources/list`
    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            uri: self.uri.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
        }
    }
}

impl std::fmt::Debug for SdkMcpResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkMcpResource")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Resource metadata as listed by `resources/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Resource URI
    pub uri: String,
    /// Display name
    pub name: String,
    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Result of `resources/read`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// One entry per returned piece of content
    pub contents: Vec<ResourceContent>,
}

impl ResourceContents {
    /// A single text entry for `uri`
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            contents: vec![ResourceContent {
                uri: uri.into(),
                mime_type: Some("text/plain".to_string()),
                text: Some(text.into()),
                blob: None,
            }],
        }
    }
}

/// One piece of resource content (text or base64 blob)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    /// URI the content belongs to
    pub uri: String,
    /// MIME type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64-encoded binary content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}
