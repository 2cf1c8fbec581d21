//! Core of the tooltrace harness.
//!
//! Builds tool adapters with caller-chosen identities, drives an agent run,
//! and captures every event the agent emits into an on-disk JSONL log.
//!
//! ```text
//! make_tool("call_api") --+
//!                          v
//!                    AgentHandle --> EventLoopAgent (impl Agent)
//!                                          |
//!                               stream_async(prompt)
//!                                          |
//!                                          v
//!                     capture() --encode--> agent_stream_events_<name>.jsonl
//! ```

pub mod agent;
pub mod capture;
pub mod event;
pub mod inspect;
pub mod presets;
pub mod tool;

pub use agent::{Agent, AgentHandle, EventLoopAgent};
pub use capture::{CaptureOptions, CaptureReport, FlushPolicy, capture, capture_sequential};
pub use event::StreamEvent;
pub use tool::{ToolSpec, make_tool};
