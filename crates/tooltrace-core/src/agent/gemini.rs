//! Gemini `generateContent` backend.
//!
//! Gemini function calls may arrive without an `id`; those requests are
//! passed through as id-less [`ToolUseRequest`]s.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::model::{
    ContentBlock, Message, Model, ModelError, ModelTurn, Role, ToolDefinition, ToolUseRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash";

#[derive(Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model_id: String,
    base_url: String,
}

impl std::fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiModel")
            .field("model_id", &self.model_id)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GeminiModel {
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model_id)
    }
}

/// Build the `generateContent` request body.
fn request_body(messages: &[Message], tools: &[ToolDefinition]) -> Value {
    let contents: Vec<Value> = messages
        .iter()
        .map(|message| {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            let parts: Vec<Value> = message
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text(text) => json!({"text": text}),
                    ContentBlock::ToolUse(tool_use) => json!({
                        "functionCall": {
                            "id": tool_use.tool_use_id,
                            "name": tool_use.name,
                            "args": tool_use.input,
                        }
                    }),
                    ContentBlock::ToolResult(result) => json!({
                        "functionResponse": {
                            "id": result.tool_use_id,
                            "name": result.name,
                            "response": {"result": result.text(), "status": result.status},
                        }
                    }),
                })
                .collect();
            json!({"role": role, "parts": parts})
        })
        .collect();

    let mut body = json!({"contents": contents});
    if !tools.is_empty() {
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": {"type": "object", "properties": {}},
                })
            })
            .collect();
        body["tools"] = json!([{"functionDeclarations": declarations}]);
    }
    body
}

/// Extract text and function calls from the first candidate.
fn parse_response(response: &Value) -> Result<ModelTurn, ModelError> {
    let parts = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            ModelError::MalformedResponse("response has no candidates[0].content.parts".to_string())
        })?;

    let mut texts = Vec::new();
    let mut tool_uses = Vec::new();

    for part in parts {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            texts.push(text.to_string());
        }
        if let Some(call) = part.get("functionCall") {
            let name = call
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| ModelError::MalformedResponse("functionCall without name".to_string()))?;
            tool_uses.push(ToolUseRequest {
                id: call.get("id").and_then(|i| i.as_str()).map(str::to_string),
                name: name.to_string(),
                input: call.get("args").cloned().unwrap_or_else(|| json!({})),
            });
        }
    }

    Ok(ModelTurn {
        text: (!texts.is_empty()).then(|| texts.concat()),
        tool_uses,
    })
}

#[async_trait]
impl Model for GeminiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn converse(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ModelError> {
        let body = request_body(messages, tools);
        debug!(model = %self.model_id, messages = messages.len(), "sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        parse_response(&payload)
    }
}
