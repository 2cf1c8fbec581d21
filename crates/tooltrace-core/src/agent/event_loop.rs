//! The built-in agent: a model/tool loop that reports progress as events.
//!
//! Each cycle asks the model for a turn, emits the assistant message, runs
//! every requested tool concurrently and emits one result event per tool in
//! completion order. The loop ends when a turn requests no tools or the
//! cycle limit is reached.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use super::model::{Message, ToolResult, ToolUse};
use super::{Agent, AgentHandle, EventStream};
use crate::event::{EventValue, StreamEvent};
use crate::tool::ToolError;

/// Knobs for the event loop.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Upper bound on model round-trips per run.
    pub max_cycles: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self { max_cycles: 5 }
    }
}

/// [`Agent`] implementation driving an [`AgentHandle`].
#[derive(Debug, Clone)]
pub struct EventLoopAgent {
    handle: Arc<AgentHandle>,
    config: EventLoopConfig,
}

impl EventLoopAgent {
    pub fn new(handle: AgentHandle) -> Self {
        Self::with_config(handle, EventLoopConfig::default())
    }

    pub fn with_config(handle: AgentHandle, config: EventLoopConfig) -> Self {
        Self {
            handle: Arc::new(handle),
            config,
        }
    }

    pub fn handle(&self) -> &AgentHandle {
        &self.handle
    }
}

/// Textual stand-in for the agent inside `result` events.
struct AgentSummary {
    name: String,
    model_id: String,
}

impl fmt::Display for AgentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<EventLoopAgent name={} model={}>", self.name, self.model_id)
    }
}

/// Assign correlation ids. A request without an id is correlated by its
/// tool name, so concurrent calls to one tool share an id.
fn resolve_tool_uses(requests: Vec<super::ToolUseRequest>) -> Vec<ToolUse> {
    requests
        .into_iter()
        .map(|req| ToolUse {
            tool_use_id: req.id.unwrap_or_else(|| req.name.clone()),
            name: req.name,
            input: req.input,
        })
        .collect()
}

fn tool_use_start_event(index: usize, tool_use: &ToolUse) -> StreamEvent {
    EventValue::map([(
        "event",
        EventValue::map([(
            "contentBlockStart",
            EventValue::map([
                ("contentBlockIndex", EventValue::from(index)),
                (
                    "start",
                    EventValue::map([(
                        "toolUse",
                        EventValue::map([
                            ("name", tool_use.name.as_str()),
                            ("toolUseId", tool_use.tool_use_id.as_str()),
                        ]),
                    )]),
                ),
            ]),
        )]),
    )])
}

impl Agent for EventLoopAgent {
    fn display_name(&self) -> &str {
        self.handle.display_name()
    }

    fn stream_async(&self, prompt: &str) -> EventStream {
        let handle = Arc::clone(&self.handle);
        let max_cycles = self.config.max_cycles.max(1);
        let prompt = prompt.to_string();

        let stream = async_stream::stream! {
            let model = Arc::clone(handle.model());
            let definitions = handle.tool_definitions();

            yield EventValue::map([
                ("init_event_loop", EventValue::Bool(true)),
                ("agent_name", EventValue::from(handle.display_name())),
                ("model", EventValue::opaque(model.model_id().to_string())),
            ]);

            let mut messages = vec![Message::user_text(prompt)];
            let mut cycle = 0usize;

            let stop_reason = loop {
                cycle += 1;
                yield EventValue::map([
                    ("start_event_loop", EventValue::Bool(true)),
                    ("cycle", EventValue::from(cycle)),
                ]);

                let turn = match model.converse(&messages, &definitions).await {
                    Ok(turn) => turn,
                    Err(e) => {
                        warn!(agent = handle.display_name(), error = %e, "model call failed; stopping run");
                        yield EventValue::map([
                            ("force_stop", EventValue::Bool(true)),
                            ("force_stop_reason", EventValue::from(e.to_string())),
                        ]);
                        return;
                    }
                };

                let tool_uses = resolve_tool_uses(turn.tool_uses);

                if let Some(text) = &turn.text {
                    yield EventValue::map([
                        ("data", EventValue::from(text.as_str())),
                        ("delta", EventValue::map([("text", text.as_str())])),
                    ]);
                }
                for (index, tool_use) in tool_uses.iter().enumerate() {
                    yield tool_use_start_event(index, tool_use);
                    yield EventValue::map([("current_tool_use", EventValue::from_serialize(tool_use))]);
                }

                let assistant = Message::assistant(turn.text, &tool_uses);
                yield EventValue::map([("message", EventValue::from_serialize(&assistant))]);
                messages.push(assistant);

                if tool_uses.is_empty() {
                    break "end_turn";
                }

                // Spawn every invocation up front so they overlap regardless
                // of how fast the consumer drains this stream. Dropping the
                // stream aborts whatever is still running.
                let mut pending: FuturesUnordered<_> = tool_uses
                    .into_iter()
                    .map(|tool_use| {
                        let tool = handle.find_tool(&tool_use.name).cloned();
                        let name = tool_use.name.clone();
                        let task = AbortOnDropHandle::new(tokio::spawn(async move {
                            match tool {
                                Some(tool) => tool.invoke().await,
                                None => Err(ToolError::NotFound(name)),
                            }
                        }));
                        async move {
                            let outcome = task.await.unwrap_or_else(|e| {
                                Err(ToolError::ExecutionFailed(format!("tool task aborted: {e}")))
                            });
                            (tool_use, outcome)
                        }
                    })
                    .collect();

                let mut results = Vec::new();
                while let Some((tool_use, outcome)) = pending.next().await {
                    if let Err(e) = &outcome {
                        warn!(tool = %tool_use.name, tool_use_id = %tool_use.tool_use_id, error = %e, "tool invocation failed");
                    }
                    let result = ToolResult::from_outcome(&tool_use, outcome);
                    debug!(tool = %result.name, tool_use_id = %result.tool_use_id, "tool completed");
                    yield EventValue::map([("tool_result", EventValue::from_serialize(&result))]);
                    results.push(result);
                }

                let user = Message::tool_results(results);
                yield EventValue::map([("message", EventValue::from_serialize(&user))]);
                messages.push(user);

                if cycle >= max_cycles {
                    break "max_cycles";
                }
            };

            let tool_names: BTreeSet<&str> = handle.tools().iter().map(|t| t.name()).collect();
            let last_message = messages
                .last()
                .map(EventValue::from_serialize)
                .unwrap_or(EventValue::Null);
            let summary = AgentSummary {
                name: handle.display_name().to_string(),
                model_id: model.model_id().to_string(),
            };

            yield EventValue::map([(
                "result",
                EventValue::map([
                    ("stop_reason", EventValue::from(stop_reason)),
                    ("message", last_message),
                    (
                        "metrics",
                        EventValue::map([
                            ("cycle_count", EventValue::from(cycle)),
                            (
                                "tool_names",
                                EventValue::Set(tool_names.into_iter().map(EventValue::from).collect()),
                            ),
                        ]),
                    ),
                    ("agent", EventValue::opaque(summary)),
                ]),
            )]);
        };

        Box::pin(stream)
    }
}
