//! Retry executor with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::{ConfigError, RetryConfig, millis_to_duration_saturating};
use crate::tools::{ExecError, ExecResult, InvokeError, Tool};

/// Width of the jitter band relative to the delay: [0.75, 1.25] x delay
const JITTER_FACTOR: f64 = 0.5;

/// Re-invokes a tool on recoverable failures
pub struct RetryExecutor<T> {
    tool: T,
    config: RetryConfig,
}

impl<T: Tool> RetryExecutor<T> {
    pub fn new(tool: T, config: RetryConfig) -> Result<Self, ConfigError> {
        debug!(tool = %tool.name(), ?config, "RetryExecutor::new: called");
        config.validate()?;
        Ok(Self { tool, config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn inner(&self) -> &T {
        &self.tool
    }

    /// Run the tool until it succeeds, fails terminally, or attempts run out
    pub async fn execute(&self, input: Value) -> ExecResult {
        debug!(tool = %self.tool.name(), max_attempts = self.config.max_attempts, "RetryExecutor::execute: called");
        let mut attempt: u32 = 1;

        loop {
            let err = match self.tool.invoke(input.clone()).await {
                Ok(value) => {
                    debug!(tool = %self.tool.name(), attempt, "RetryExecutor::execute: success");
                    return Ok(value);
                }
                Err(e) => e.into_exec_error(self.tool.name()),
            };

            let Some(delay) = self.next_delay(&err, attempt) else {
                debug!(tool = %self.tool.name(), attempt, error = %err, "RetryExecutor::execute: giving up");
                return Err(err);
            };

            warn!(
                tool = %self.tool.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after recoverable error"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Whether the policy allows another attempt after this error
    pub fn is_retryable(&self, err: &ExecError) -> bool {
        match err {
            ExecError::CircuitOpen(_) => false,
            ExecError::Tool(e) => e.recoverable && !self.config.terminal_errors.contains(&e.kind),
        }
    }

    /// Delay before the next attempt, or `None` when the loop must stop
    fn next_delay(&self, err: &ExecError, attempt: u32) -> Option<Duration> {
        if !self.is_retryable(err) || attempt >= self.config.max_attempts {
            return None;
        }

        if let Some(retry_after) = err.as_tool_error().and_then(|e| e.retry_after) {
            return Some(retry_after);
        }

        let delay = self.config.delay_for_attempt(attempt);
        Some(if self.config.jitter { apply_jitter(delay) } else { delay })
    }
}

/// Spread `delay` uniformly over [0.75, 1.25] x delay
fn apply_jitter(delay: Duration) -> Duration {
    let ms = delay.as_secs_f64() * 1000.0;
    let offset = ms * JITTER_FACTOR / 2.0;
    let jittered = ms - offset + ms * JITTER_FACTOR * rand::rng().random::<f64>();
    millis_to_duration_saturating(jittered)
}

#[async_trait]
impl<T: Tool> Tool for RetryExecutor<T> {
    fn name(&self) -> &str {
        self.tool.name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        self.execute(input).await.map_err(InvokeError::from)
    }
}
