//! Deterministic offline model.
//!
//! Stands in for a real backend when reproducing collisions without
//! network access: the first turn requests every advertised tool a fixed
//! number of times in one batch, the next turn summarizes the results.

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::model::{Message, Model, ModelError, ModelTurn, Role, ToolDefinition, ToolUseRequest};

/// Whether the scripted model mints correlation ids for its tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolUseIds {
    /// A fresh id per call, like most hosted backends.
    #[default]
    Unique,
    /// No ids at all, leaving correlation to the runtime.
    Omitted,
}

#[derive(Debug, Clone)]
pub struct ScriptedModel {
    calls_per_tool: usize,
    ids: ToolUseIds,
}

impl ScriptedModel {
    pub const MODEL_ID: &str = "scripted";

    pub fn new(calls_per_tool: usize, ids: ToolUseIds) -> Self {
        Self { calls_per_tool, ids }
    }

    fn next_id(&self) -> Option<String> {
        match self.ids {
            ToolUseIds::Unique => Some(format!("tooluse_{}", Uuid::new_v4().simple())),
            ToolUseIds::Omitted => None,
        }
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new(2, ToolUseIds::Unique)
    }
}

#[async_trait]
impl Model for ScriptedModel {
    fn model_id(&self) -> &str {
        Self::MODEL_ID
    }

    async fn converse(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ModelError> {
        let last = messages
            .last()
            .ok_or_else(|| ModelError::MalformedResponse("empty conversation".to_string()))?;

        // Results came back: wrap up.
        if last.role == Role::User && last.results().next().is_some() {
            let lines: Vec<String> = last
                .results()
                .map(|r| format!("{} ({}): {}", r.name, r.tool_use_id, r.text()))
                .collect();
            return Ok(ModelTurn {
                text: Some(format!(
                    "I called the tools {} times. Results:\n{}",
                    lines.len(),
                    lines.join("\n")
                )),
                tool_uses: Vec::new(),
            });
        }

        if tools.is_empty() || self.calls_per_tool == 0 {
            return Ok(ModelTurn {
                text: Some("There are no tools for me to call.".to_string()),
                tool_uses: Vec::new(),
            });
        }

        // One batch per distinct name; duplicate definitions are
        // indistinguishable to a model anyway.
        let mut names: Vec<&str> = Vec::new();
        for tool in tools {
            if !names.contains(&tool.name.as_str()) {
                names.push(&tool.name);
            }
        }

        let tool_uses = names
            .iter()
            .flat_map(|name| std::iter::repeat_n(*name, self.calls_per_tool))
            .map(|name| ToolUseRequest {
                id: self.next_id(),
                name: name.to_string(),
                input: json!({}),
            })
            .collect::<Vec<_>>();

        Ok(ModelTurn {
            text: Some(format!("Calling {} now.", names.join(", "))),
            tool_uses,
        })
    }
}
