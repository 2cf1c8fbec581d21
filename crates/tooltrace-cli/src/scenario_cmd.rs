//! `tooltrace scenario` command: run or list the built-in reproductions.

use std::sync::Arc;

use anyhow::{Result, bail};
use tokio_util::sync::CancellationToken;

use tooltrace_core::agent::Model;
use tooltrace_core::presets::{find_preset, load_presets, preset_names};

use crate::config::HarnessConfig;
use crate::run_cmd::{capture_handles, gemini_model, print_reports};
use crate::{BackendArgs, ModelArg};

/// List every scenario with its shape.
pub fn list_scenarios() {
    for preset in load_presets() {
        println!("{}", preset.name);
        println!("  {}", preset.description);
        println!(
            "  agents: {}  tool: {} x{}  flush: {}  ids: {}",
            preset.agents.join(", "),
            preset.tool_name,
            preset.tools_per_agent,
            preset.policy,
            if preset.omit_ids { "omitted" } else { "unique" }
        );
    }
}

/// Run the named scenario.
pub async fn run_scenario(
    name: &str,
    backend: &BackendArgs,
    config: &HarnessConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let Some(preset) = find_preset(name) else {
        bail!(
            "unknown scenario {name:?}; available: {}",
            preset_names().join(", ")
        );
    };

    let model: Arc<dyn Model> = match backend.model {
        ModelArg::Scripted => Arc::new(preset.scripted_model(backend.calls)),
        ModelArg::Gemini => gemini_model(backend, config)?,
    };

    println!("Scenario: {}", preset.name);
    println!("  {}", preset.description);
    println!();

    let handles = preset.agent_handles(model, &backend.simulated_api());
    let reports = capture_handles(
        handles,
        &preset.prompt,
        preset.policy,
        &config.output_dir,
        cancel,
    )
    .await?;
    print_reports(&reports);
    Ok(())
}
