//! Agent runtime interface and the built-in event-loop agent.
//!
//! # Architecture
//!
//! ```text
//! AgentHandle { display_name, tools, model }
//!     |
//!     v
//! EventLoopAgent (impl Agent)
//!     |
//!     |   stream_async(prompt) --> Stream<StreamEvent>
//!     |        |
//!     |        +--> Model::converse(messages, tool definitions)
//!     |        +--> ToolSpec::invoke() x N, concurrently
//! ```
//!
//! The capture engine only depends on [`Agent`]; everything behind it is
//! treated as an opaque event source.

pub mod event_loop;
pub mod gemini;
pub mod model;
pub mod scripted;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;

use crate::event::StreamEvent;
use crate::tool::ToolSpec;

pub use event_loop::{EventLoopAgent, EventLoopConfig};
pub use gemini::GeminiModel;
pub use model::{Model, ModelError, ModelTurn, ToolDefinition, ToolUseRequest};
pub use scripted::{ScriptedModel, ToolUseIds};

/// Boxed event stream produced by one agent run.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// An agent that can be driven by a prompt.
///
/// # Object Safety
///
/// This trait is object-safe so the capture engine can take `&dyn Agent`.
pub trait Agent: Send + Sync {
    /// Identity used to name the run's log file.
    fn display_name(&self) -> &str;

    /// Start a run and return its events.
    ///
    /// The stream must terminate once the run is over. Success and failure
    /// both end the same way: the stream is exhausted.
    fn stream_async(&self, prompt: &str) -> EventStream;
}

// Compile-time assertion: Agent must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn Agent) {}
};

/// Everything one agent run is built from.
///
/// Immutable once constructed. Tool names are not checked for uniqueness.
#[derive(Clone)]
pub struct AgentHandle {
    display_name: String,
    tools: Vec<ToolSpec>,
    model: Arc<dyn Model>,
}

impl AgentHandle {
    pub fn new(display_name: impl Into<String>, tools: Vec<ToolSpec>, model: Arc<dyn Model>) -> Self {
        Self {
            display_name: display_name.into(),
            tools,
            model,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Tools in registration order.
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn model(&self) -> &Arc<dyn Model> {
        &self.model
    }

    /// Resolve a tool by public name. With duplicate names, the first
    /// registered tool wins.
    pub fn find_tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Definitions advertised to the model, one per registered tool.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDefinition::from).collect()
    }
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("display_name", &self.display_name)
            .field("tools", &self.tools.iter().map(ToolSpec::name).collect::<Vec<_>>())
            .field("model", &self.model.model_id())
            .finish()
    }
}
