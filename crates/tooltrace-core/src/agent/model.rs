//! Conversation types and the model interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::{ToolError, ToolSpec};

/// Errors from a model backend.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One content block inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlock {
    Text(String),
    ToolUse(ToolUse),
    ToolResult(ToolResult),
}

/// A tool invocation as recorded in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUse {
    pub tool_use_id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultContent {
    pub text: String,
}

/// The outcome of one tool invocation, correlated by `tool_use_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_use_id: String,
    pub name: String,
    pub status: ToolStatus,
    pub content: Vec<ResultContent>,
}

impl ToolResult {
    pub fn from_outcome(tool_use: &ToolUse, outcome: Result<String, ToolError>) -> Self {
        let (status, text) = match outcome {
            Ok(text) => (ToolStatus::Success, text),
            Err(e) => (ToolStatus::Error, e.to_string()),
        };
        Self {
            tool_use_id: tool_use.tool_use_id.clone(),
            name: tool_use.name.clone(),
            status,
            content: vec![ResultContent { text }],
        }
    }

    /// Concatenated text of all content entries.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentBlock::Text(text.into())],
        }
    }

    pub fn assistant(text: Option<String>, tool_uses: &[ToolUse]) -> Self {
        let content = text
            .into_iter()
            .map(ContentBlock::Text)
            .chain(tool_uses.iter().cloned().map(ContentBlock::ToolUse))
            .collect();
        Self {
            role: Role::Assistant,
            content,
        }
    }

    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(ContentBlock::ToolResult).collect(),
        }
    }

    /// Tool results carried by this message, in order.
    pub fn results(&self) -> impl Iterator<Item = &ToolResult> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolResult(result) => Some(result),
            _ => None,
        })
    }
}

/// What a model is told about one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
}

impl From<&ToolSpec> for ToolDefinition {
    fn from(tool: &ToolSpec) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
        }
    }
}

/// A tool invocation requested by the model.
///
/// `id` is whatever correlation id the backend supplied; some backends
/// supply none.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseRequest {
    pub id: Option<String>,
    pub name: String,
    pub input: Value,
}

/// One model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_uses: Vec<ToolUseRequest>,
}

/// A conversational model backend.
#[async_trait]
pub trait Model: Send + Sync {
    /// Backend model identifier (e.g. "gemini-2.5-flash").
    fn model_id(&self) -> &str;

    /// Produce the next assistant turn for `messages`.
    async fn converse(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ModelError>;
}
