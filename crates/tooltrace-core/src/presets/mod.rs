//! Built-in reproduction scenarios.
//!
//! The scenarios are defined in `scenarios.toml` and embedded in the binary
//! at compile time. Each one names the agents to run, the (shared) tool
//! name they receive, and how the captured log is flushed.

use std::sync::Arc;

use serde::Deserialize;

use crate::agent::{AgentHandle, Model, ScriptedModel, ToolUseIds};
use crate::capture::FlushPolicy;
use crate::tool::{SimulatedApi, make_tool_with};

/// Prompt every scenario sends unless overridden.
pub const DEFAULT_PROMPT: &str = "Can you call my API twice?";

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

/// One scenario from the embedded library.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioPreset {
    /// Unique scenario name (e.g. `duplicate-tool-use-id`).
    pub name: String,
    pub description: String,
    /// Display names of the agents, run in this order.
    pub agents: Vec<String>,
    /// Public name given to every adapter.
    pub tool_name: String,
    /// How many separately made adapters each agent holds.
    pub tools_per_agent: usize,
    pub policy: FlushPolicy,
    /// Whether the offline model leaves tool-use ids out.
    pub omit_ids: bool,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl ScenarioPreset {
    /// The offline model matching this scenario.
    pub fn scripted_model(&self, calls_per_tool: usize) -> ScriptedModel {
        let ids = if self.omit_ids {
            ToolUseIds::Omitted
        } else {
            ToolUseIds::Unique
        };
        ScriptedModel::new(calls_per_tool, ids)
    }

    /// Build one handle per agent. Adapters are minted per agent, never
    /// shared between handles.
    pub fn agent_handles(&self, model: Arc<dyn Model>, api: &SimulatedApi) -> Vec<AgentHandle> {
        self.agents
            .iter()
            .map(|display_name| {
                let tools = (0..self.tools_per_agent)
                    .map(|_| make_tool_with(self.tool_name.clone(), api.clone()))
                    .collect();
                AgentHandle::new(display_name.clone(), tools, Arc::clone(&model))
            })
            .collect()
    }
}

/// Container for deserializing the embedded TOML file.
#[derive(Debug, Deserialize)]
struct ScenarioLibrary {
    scenarios: Vec<ScenarioPreset>,
}

static SCENARIOS_TOML: &str = include_str!("scenarios.toml");

/// Load all scenarios from the embedded library.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed. The file ships with the
/// binary, so this is caught by the tests below.
pub fn load_presets() -> Vec<ScenarioPreset> {
    let lib: ScenarioLibrary =
        toml::from_str(SCENARIOS_TOML).expect("embedded scenarios.toml is invalid");
    lib.scenarios
}

/// Look up a scenario by name.
pub fn find_preset(name: &str) -> Option<ScenarioPreset> {
    load_presets().into_iter().find(|p| p.name == name)
}

/// Names of all scenarios, in library order.
pub fn preset_names() -> Vec<String> {
    load_presets().into_iter().map(|p| p.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn load_presets_returns_nonempty() {
        let presets = load_presets();
        assert!(presets.len() >= 4);
    }

    #[test]
    fn all_preset_names_are_unique() {
        let names = preset_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn every_preset_is_runnable() {
        for preset in load_presets() {
            assert!(!preset.agents.is_empty(), "{} has no agents", preset.name);
            assert!(preset.tools_per_agent >= 1, "{} has no tools", preset.name);
            assert_eq!(preset.prompt, DEFAULT_PROMPT);
        }
    }

    #[test]
    fn original_reproductions_use_both_flush_policies() {
        let duplicate = find_preset("duplicate-tool-use-id").unwrap();
        assert_eq!(duplicate.policy, FlushPolicy::Batch);
        assert!(duplicate.omit_ids);

        let missing = find_preset("missing-tool-id").unwrap();
        assert_eq!(missing.policy, FlushPolicy::Incremental);
        assert_eq!(missing.agents, vec!["gemini_agent"]);
    }

    #[test]
    fn cross_agent_handles_share_tool_name_only() {
        let preset = find_preset("cross-agent-collision").unwrap();
        let model: Arc<dyn Model> = Arc::new(preset.scripted_model(2));
        let handles = preset.agent_handles(model, &SimulatedApi::default());

        assert_eq!(handles.len(), 2);
        assert_ne!(handles[0].display_name(), handles[1].display_name());
        for handle in &handles {
            assert_eq!(handle.tools().len(), 1);
            assert_eq!(handle.tools()[0].name(), "call_api");
        }
    }

    #[test]
    fn shared_agent_holds_two_same_named_tools() {
        let preset = find_preset("shared-agent-collision").unwrap();
        let model: Arc<dyn Model> = Arc::new(preset.scripted_model(2));
        let handles = preset.agent_handles(model, &SimulatedApi::default());
        assert_eq!(handles.len(), 1);
        let names: Vec<_> = handles[0].tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["call_api", "call_api"]);
    }

    #[test]
    fn unknown_preset_is_none() {
        assert!(find_preset("nope").is_none());
    }
}
