mod config;
mod credentials;
mod inspect_cmd;
mod run_cmd;
mod scenario_cmd;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tooltrace_core::FlushPolicy;
use tooltrace_core::presets::DEFAULT_PROMPT;
use tooltrace_core::tool::SimulatedApi;

use config::HarnessConfig;

#[derive(Parser)]
#[command(
    name = "tooltrace",
    about = "Capture agent tool-call event streams to reproduce tool identity collisions"
)]
struct Cli {
    /// Gemini model id (overrides TOOLTRACE_MODEL_ID env var)
    #[arg(long, global = true)]
    model_id: Option<String>,

    /// Directory logs are written to (overrides TOOLTRACE_OUTPUT_DIR env var)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a tooltrace config file
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Capture one or more agents that each get an adapter with the same tool name
    Run {
        /// Agent display name; repeat for several agents, run in order
        #[arg(long = "agent", required = true)]
        agents: Vec<String>,
        /// Public name given to every adapter
        #[arg(long, default_value = "call_api")]
        tool_name: String,
        /// Prompt sent to every agent
        #[arg(long, default_value = DEFAULT_PROMPT)]
        prompt: String,
        /// When events reach the disk: batch or incremental
        #[arg(long, default_value = "batch")]
        flush: FlushPolicy,
        /// Leave tool-use ids out of scripted model requests
        #[arg(long)]
        omit_ids: bool,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Run a built-in reproduction scenario
    Scenario {
        /// Scenario name (see --list)
        #[arg(required_unless_present = "list")]
        name: Option<String>,
        /// List available scenarios
        #[arg(long)]
        list: bool,
        #[command(flatten)]
        backend: BackendArgs,
    },
    /// Summarize a captured log
    Inspect {
        /// Path to an agent_stream_events_*.jsonl file
        file: PathBuf,
    },
}

/// Which model drives the agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    /// Deterministic offline model
    Scripted,
    /// Live Gemini API (needs GOOGLE_AI_API_KEY)
    Gemini,
}

/// Backend options shared by `run` and `scenario`.
#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Model backend
    #[arg(long, value_enum, default_value_t = ModelArg::Scripted)]
    pub model: ModelArg,
    /// Simulated API latency in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub latency_ms: u64,
    /// Probability in [0, 1] that a simulated call fails
    #[arg(long, default_value_t = 0.0)]
    pub failure_rate: f64,
    /// Calls per tool the scripted model requests
    #[arg(long, default_value_t = 2)]
    pub calls: usize,
    /// Dotenv file holding GOOGLE_AI_API_KEY
    #[arg(long, default_value = credentials::DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,
}

impl BackendArgs {
    pub fn simulated_api(&self) -> SimulatedApi {
        SimulatedApi::with_latency(Duration::from_millis(self.latency_ms))
            .with_failure_rate(self.failure_rate)
    }
}

/// Execute the `tooltrace init` command: write a config file.
fn cmd_init(cli_model_id: Option<&str>, cli_output_dir: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let model_id = cli_model_id.unwrap_or(tooltrace_core::agent::gemini::DEFAULT_MODEL_ID);
    let output_dir = cli_output_dir.unwrap_or(Path::new(config::DEFAULT_OUTPUT_DIR));

    let cfg = config::ConfigFile {
        model: config::ModelSection {
            id: model_id.to_string(),
        },
        output: config::OutputSection {
            dir: output_dir.to_path_buf(),
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  model.id = {model_id}");
    println!("  output.dir = {}", output_dir.display());

    Ok(())
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping capture");
            trigger.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            cmd_init(cli.model_id.as_deref(), cli.output_dir.as_deref(), force)?;
        }
        Commands::Run {
            agents,
            tool_name,
            prompt,
            flush,
            omit_ids,
            backend,
        } => {
            let resolved = HarnessConfig::resolve(cli.model_id.as_deref(), cli.output_dir.as_deref())?;
            let request = run_cmd::RunRequest {
                agents,
                tool_name,
                prompt,
                policy: flush,
                omit_ids,
            };
            run_cmd::run_agents(&request, &backend, &resolved, cancel_on_ctrl_c()).await?;
        }
        Commands::Scenario {
            name,
            list,
            backend,
        } => match name {
            Some(name) if !list => {
                let resolved =
                    HarnessConfig::resolve(cli.model_id.as_deref(), cli.output_dir.as_deref())?;
                scenario_cmd::run_scenario(&name, &backend, &resolved, cancel_on_ctrl_c()).await?;
            }
            _ => scenario_cmd::list_scenarios(),
        },
        Commands::Inspect { file } => {
            inspect_cmd::run_inspect(&file)?;
        }
    }

    Ok(())
}
