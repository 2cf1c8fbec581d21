//! `tooltrace run` command: capture ad-hoc agents that share a tool name.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use tooltrace_core::agent::{Agent, AgentHandle, EventLoopAgent, GeminiModel, Model, ScriptedModel, ToolUseIds};
use tooltrace_core::capture::CaptureState;
use tooltrace_core::inspect::inspect_log;
use tooltrace_core::tool::make_tool_with;
use tooltrace_core::{CaptureOptions, CaptureReport, FlushPolicy, capture_sequential};

use crate::config::HarnessConfig;
use crate::credentials::Credentials;
use crate::inspect_cmd::summary_lines;
use crate::{BackendArgs, ModelArg};

/// Everything `tooltrace run` needs besides the backend.
#[derive(Debug)]
pub struct RunRequest {
    pub agents: Vec<String>,
    pub tool_name: String,
    pub prompt: String,
    pub policy: FlushPolicy,
    pub omit_ids: bool,
}

/// Build the live Gemini model from credentials and resolved config.
pub fn gemini_model(backend: &BackendArgs, config: &HarnessConfig) -> Result<Arc<dyn Model>> {
    let credentials = Credentials::load(&backend.env_file)?;
    Ok(Arc::new(GeminiModel::new(
        credentials.api_key,
        config.model_id.clone(),
    )))
}

/// Run the run command.
pub async fn run_agents(
    request: &RunRequest,
    backend: &BackendArgs,
    config: &HarnessConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let model: Arc<dyn Model> = match backend.model {
        ModelArg::Scripted => {
            let ids = if request.omit_ids {
                ToolUseIds::Omitted
            } else {
                ToolUseIds::Unique
            };
            Arc::new(ScriptedModel::new(backend.calls, ids))
        }
        ModelArg::Gemini => {
            if request.omit_ids {
                debug!("--omit-ids only applies to the scripted model; ignoring");
            }
            gemini_model(backend, config)?
        }
    };

    let api = backend.simulated_api();
    let handles = request
        .agents
        .iter()
        .map(|name| {
            // A fresh adapter per agent; only the name is shared.
            let tool = make_tool_with(request.tool_name.clone(), api.clone());
            AgentHandle::new(name.clone(), vec![tool], Arc::clone(&model))
        })
        .collect();

    let reports = capture_handles(
        handles,
        &request.prompt,
        request.policy,
        &config.output_dir,
        cancel,
    )
    .await?;
    print_reports(&reports);
    Ok(())
}

/// Capture each handle in turn with the event-loop agent.
pub async fn capture_handles(
    handles: Vec<AgentHandle>,
    prompt: &str,
    policy: FlushPolicy,
    output_dir: &Path,
    cancel: CancellationToken,
) -> Result<Vec<CaptureReport>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let agents: Vec<EventLoopAgent> = handles.into_iter().map(EventLoopAgent::new).collect();
    let refs: Vec<&dyn Agent> = agents.iter().map(|a| a as &dyn Agent).collect();
    let options = CaptureOptions::new(policy, output_dir).with_cancel(cancel);

    let reports = capture_sequential(&refs, prompt, &options)
        .await
        .context("capture failed")?;
    Ok(reports)
}

/// Print one block per captured run, followed by its log summary.
pub fn print_reports(reports: &[CaptureReport]) {
    for report in reports {
        let elapsed = report.finished_at - report.started_at;
        println!("Agent: {}", report.agent);
        println!("  Log: {}", report.path.display());
        println!(
            "  Events: {} ({}, {}, {:.2}s)",
            report.event_count(),
            report.policy,
            report.final_state,
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        match inspect_log(&report.path) {
            Ok(summary) => {
                for line in summary_lines(&summary) {
                    println!("  {line}");
                }
            }
            Err(e) => println!("  (could not summarize log: {e:#})"),
        }
        if report.final_state == CaptureState::Cancelled {
            println!("  Run was cancelled; log holds the events captured so far.");
        }
        println!();
    }
}
