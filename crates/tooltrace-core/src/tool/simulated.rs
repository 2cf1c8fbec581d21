//! Reference tool body: a slow remote call that returns a random number.

use std::time::Duration;

use rand::Rng;

use super::ToolError;

/// Latency of the simulated outbound call.
pub const DEFAULT_LATENCY: Duration = Duration::from_secs(3);

pub const CALL_API_DESCRIPTION: &str = "Call API asynchronously.";

/// Sleep for [`DEFAULT_LATENCY`], then return `"API result: <n>"` with `n`
/// in `1..=1000`.
pub async fn call_api() -> String {
    tokio::time::sleep(DEFAULT_LATENCY).await;
    api_result()
}

fn api_result() -> String {
    let n: u32 = rand::rng().random_range(1..=1000);
    format!("API result: {n}")
}

/// Tunable version of [`call_api`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedApi {
    pub latency: Duration,
    /// Probability in `[0, 1]` that a call fails after its latency.
    pub failure_rate: f64,
}

impl SimulatedApi {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }

    pub async fn call(&self) -> Result<String, ToolError> {
        tokio::time::sleep(self.latency).await;

        let fail = self.failure_rate > 0.0
            && rand::rng().random_bool(self.failure_rate.clamp(0.0, 1.0));
        if fail {
            return Err(ToolError::ExecutionFailed(
                "simulated API returned an error".to_string(),
            ));
        }

        Ok(api_result())
    }
}

impl Default for SimulatedApi {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY,
            failure_rate: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn parse_result(result: &str) -> u32 {
        result
            .strip_prefix("API result: ")
            .unwrap_or_else(|| panic!("unexpected format: {result}"))
            .parse()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn call_api_waits_default_latency() {
        let start = Instant::now();
        let result = call_api().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= DEFAULT_LATENCY, "returned early: {elapsed:?}");
        let n = parse_result(&result);
        assert!((1..=1000).contains(&n));
    }

    #[tokio::test(start_paused = true)]
    async fn results_stay_in_range() {
        let api = SimulatedApi::with_latency(Duration::from_millis(1));
        for _ in 0..200 {
            let n = parse_result(&api.call().await.unwrap());
            assert!((1..=1000).contains(&n), "out of range: {n}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn certain_failure_rate_always_fails() {
        let api = SimulatedApi::with_latency(Duration::from_millis(10)).with_failure_rate(1.0);
        let err = api.call().await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_overlap() {
        let api = SimulatedApi::default();
        let start = Instant::now();
        let (a, b) = tokio::join!(api.call(), api.call());
        assert!(a.is_ok() && b.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed < DEFAULT_LATENCY * 2, "calls ran serially: {elapsed:?}");
    }
}
