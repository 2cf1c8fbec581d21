//! Streaming capture engine: drives one agent run and records every event
//! it emits, in arrival order, to the agent's JSONL log.
//!
//! Events are never reordered, merged or deduplicated, and their contents
//! are never inspected. Two flush policies are supported:
//!
//! - [`FlushPolicy::Batch`]: buffer everything, write once when the stream
//!   is drained. Nothing reaches the disk if the process dies mid-run.
//! - [`FlushPolicy::Incremental`]: write each event as it arrives. Partial
//!   runs leave a partial, line-valid log.

pub mod writer;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::{Agent, EventStream};
use crate::event::StreamEvent;

pub use writer::{CaptureError, IncrementalWriter, log_file_name, log_path, write_log};

/// Events of one run, in arrival order.
pub type CapturedLog = Vec<StreamEvent>;

/// When captured events reach the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicy {
    #[default]
    Batch,
    Incremental,
}

impl fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushPolicy::Batch => f.write_str("batch"),
            FlushPolicy::Incremental => f.write_str("incremental"),
        }
    }
}

impl FromStr for FlushPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(FlushPolicy::Batch),
            "incremental" => Ok(FlushPolicy::Incremental),
            other => Err(format!("unknown flush policy: {other} (expected batch or incremental)")),
        }
    }
}

/// Progress of a capture.
///
/// ```text
/// started   -> streaming
/// streaming -> streaming
/// started   -> drained    (empty stream)
/// streaming -> drained
/// started   -> cancelled
/// streaming -> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Stream opened, nothing received yet.
    Started,
    /// At least one event received; waiting for the next.
    Streaming,
    /// The stream reported exhaustion.
    Drained,
    /// The caller stopped the capture before exhaustion.
    Cancelled,
}

impl CaptureState {
    pub fn can_transition_to(self, next: CaptureState) -> bool {
        use CaptureState::*;
        matches!(
            (self, next),
            (Started, Streaming)
                | (Streaming, Streaming)
                | (Started, Drained)
                | (Streaming, Drained)
                | (Started, Cancelled)
                | (Streaming, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CaptureState::Drained | CaptureState::Cancelled)
    }

    fn advance(&mut self, next: CaptureState) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid capture transition: {self:?} -> {next:?}"
        );
        *self = next;
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Started => "started",
            CaptureState::Streaming => "streaming",
            CaptureState::Drained => "drained",
            CaptureState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// How a capture runs.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub policy: FlushPolicy,
    /// Directory the log file is created in.
    pub output_dir: PathBuf,
    /// Stops the capture early when cancelled. Captured events are kept.
    pub cancel: Option<CancellationToken>,
}

impl CaptureOptions {
    pub fn new(policy: FlushPolicy, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            policy,
            output_dir: output_dir.into(),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::new(FlushPolicy::default(), ".")
    }
}

/// Outcome of one capture.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub agent: String,
    pub policy: FlushPolicy,
    pub path: PathBuf,
    pub events: CapturedLog,
    pub final_state: CaptureState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CaptureReport {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

async fn next_event(
    stream: &mut EventStream,
    cancel: Option<&CancellationToken>,
) -> Option<Option<StreamEvent>> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => None,
            event = stream.next() => Some(event),
        },
        None => Some(stream.next().await),
    }
}

fn is_cancelled(options: &CaptureOptions) -> bool {
    options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
}

/// Run `agent` on `prompt` and record its event stream.
///
/// The log file is created (truncated) when the first event arrives for
/// incremental captures and after the last for batch captures. An empty
/// stream yields an existing, empty log. A capture cancelled before its
/// first event leaves any existing log untouched.
///
/// # Errors
///
/// Fails if the display name cannot name a file, an event cannot be
/// encoded, or the log cannot be written. Tool failures inside the run are
/// ordinary events and never surface here.
pub async fn capture(
    agent: &dyn Agent,
    prompt: &str,
    options: &CaptureOptions,
) -> Result<CaptureReport, CaptureError> {
    let name = agent.display_name().to_string();
    let path = log_path(&options.output_dir, &name)?;
    let started_at = Utc::now();

    let mut state = CaptureState::Started;
    let mut events: CapturedLog = Vec::new();

    if is_cancelled(options) {
        warn!(agent = %name, "capture cancelled before start; log left untouched");
        state.advance(CaptureState::Cancelled);
        return Ok(CaptureReport {
            agent: name,
            policy: options.policy,
            path,
            events,
            final_state: state,
            started_at,
            finished_at: Utc::now(),
        });
    }

    info!(agent = %name, policy = %options.policy, path = %path.display(), "starting to stream events");

    let mut writer: Option<IncrementalWriter> = None;
    let mut stream = agent.stream_async(prompt);

    while !state.is_terminal() {
        match next_event(&mut stream, options.cancel.as_ref()).await {
            Some(Some(event)) => {
                state.advance(CaptureState::Streaming);
                debug!(agent = %name, index = events.len(), "captured event");
                if options.policy == FlushPolicy::Incremental {
                    if writer.is_none() {
                        writer = Some(IncrementalWriter::create(&options.output_dir, &name).await?);
                    }
                    if let Some(w) = writer.as_mut() {
                        if let Err(e) = w.append(&event) {
                            // The writer has stopped; its own error is the cause.
                            let cause = match writer.take() {
                                Some(w) => w.finish().await.err().unwrap_or(e),
                                None => e,
                            };
                            return Err(cause);
                        }
                    }
                }
                events.push(event);
            }
            Some(None) => state.advance(CaptureState::Drained),
            None => {
                warn!(agent = %name, captured = events.len(), "capture cancelled; keeping partial log");
                state.advance(CaptureState::Cancelled);
            }
        }
    }
    drop(stream);

    match writer {
        Some(w) => {
            w.finish().await?;
        }
        None if state == CaptureState::Cancelled && events.is_empty() => {
            warn!(agent = %name, "nothing captured; log left untouched");
        }
        None => {
            write_log(&options.output_dir, &name, &events).await?;
        }
    }

    let finished_at = Utc::now();
    info!(
        agent = %name,
        events = events.len(),
        state = %state,
        path = %path.display(),
        "finished streaming events"
    );

    Ok(CaptureReport {
        agent: name,
        policy: options.policy,
        path,
        events,
        final_state: state,
        started_at,
        finished_at,
    })
}

/// Capture several agents one after another, each into its own log.
///
/// Runs never overlap. Stops at the first run that fails; logs of earlier
/// runs stay on disk. Once the cancel token fires, no further run starts.
pub async fn capture_sequential(
    agents: &[&dyn Agent],
    prompt: &str,
    options: &CaptureOptions,
) -> Result<Vec<CaptureReport>, CaptureError> {
    let mut reports = Vec::with_capacity(agents.len());
    for agent in agents {
        if is_cancelled(options) {
            warn!(
                remaining = agents.len() - reports.len(),
                "capture cancelled; skipping remaining agents"
            );
            break;
        }
        let report = capture(*agent, prompt, options).await?;
        let cancelled = report.final_state == CaptureState::Cancelled;
        reports.push(report);
        if cancelled {
            break;
        }
    }
    Ok(reports)
}
