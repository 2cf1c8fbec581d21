//! Tool adapters with caller-chosen identities.
//!
//! A [`ToolSpec`] pairs a public name with an async implementation. The
//! agent's dispatch layer only ever sees the name, so two specs built from
//! separate calls with the same name are indistinguishable to it. Nothing
//! here enforces uniqueness; colliding names are the point.

pub mod simulated;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

pub use simulated::{CALL_API_DESCRIPTION, DEFAULT_LATENCY, SimulatedApi, call_api};

/// Future returned by a tool invocation.
pub type ToolFuture = BoxFuture<'static, Result<String, ToolError>>;

type ToolFn = dyn Fn() -> ToolFuture + Send + Sync;

/// Errors a tool invocation can report.
///
/// These never escape the agent run: the event loop turns them into
/// tool-result events with an error status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("no tool registered under name: {0}")]
    NotFound(String),
}

/// A named, zero-argument async tool.
#[derive(Clone)]
pub struct ToolSpec {
    public_name: String,
    description: String,
    implementation: Arc<ToolFn>,
}

impl ToolSpec {
    /// Wrap an async implementation under `public_name`.
    ///
    /// The implementation is not called until [`ToolSpec::invoke`].
    pub fn new<F, Fut>(public_name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            public_name: public_name.into(),
            description: description.into(),
            implementation: Arc::new(move || f().boxed()),
        }
    }

    /// The name the dispatch layer routes and correlates by.
    pub fn name(&self) -> &str {
        &self.public_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Start one invocation of the wrapped implementation.
    pub fn invoke(&self) -> ToolFuture {
        (self.implementation)()
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("public_name", &self.public_name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Mint an adapter for the simulated API under `public_name`.
///
/// Every adapter runs the same body with the default latency; only the
/// identity differs.
pub fn make_tool(public_name: impl Into<String>) -> ToolSpec {
    make_tool_with(public_name, SimulatedApi::default())
}

/// Like [`make_tool`], with explicit simulation parameters.
pub fn make_tool_with(public_name: impl Into<String>, api: SimulatedApi) -> ToolSpec {
    ToolSpec::new(public_name, CALL_API_DESCRIPTION, move || {
        let api = api.clone();
        async move { api.call().await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn make_tool_uses_public_name() {
        let tool = make_tool("call_api");
        assert_eq!(tool.name(), "call_api");
        assert_eq!(tool.description(), CALL_API_DESCRIPTION);

        let renamed = make_tool("fetch_weather");
        assert_eq!(renamed.name(), "fetch_weather");
    }

    #[test]
    fn construction_does_not_invoke_implementation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _tool = ToolSpec::new("counted", "counts calls", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("done".to_string()) }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn colliding_names_are_accepted_and_independent() {
        let first = ToolSpec::new("call_api", "first", || async { Ok("one".to_string()) });
        let second = ToolSpec::new("call_api", "second", || async { Ok("two".to_string()) });

        assert_eq!(first.name(), second.name());
        assert_eq!(first.invoke().await.unwrap(), "one");
        assert_eq!(second.invoke().await.unwrap(), "two");
    }

    #[tokio::test(start_paused = true)]
    async fn made_tool_runs_simulated_api() {
        let tool = make_tool_with("call_api", SimulatedApi::with_latency(Duration::from_millis(50)));
        let result = tool.invoke().await.unwrap();
        assert!(result.starts_with("API result: "), "unexpected result: {result}");
    }

    #[tokio::test]
    async fn failing_implementation_reports_error() {
        let tool = ToolSpec::new("broken", "always fails", || async {
            Err(ToolError::ExecutionFailed("connection refused".to_string()))
        });
        let err = tool.invoke().await.unwrap_err();
        assert_eq!(err.to_string(), "tool execution failed: connection refused");
    }

    #[test]
    fn debug_hides_implementation() {
        let tool = make_tool("call_api");
        let debug = format!("{tool:?}");
        assert!(debug.contains("call_api"));
        assert!(debug.contains(".."));
    }
}
