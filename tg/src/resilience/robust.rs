//! RobustToolExecutor - retry around a circuit breaker around a tool

use std::sync::Arc;

use serde_json::Value;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use super::breaker::{CircuitBreakerState, CircuitBreakerTool};
use super::config::{CircuitBreakerConfig, ConfigError, RetryConfig, RobustConfig};
use super::retry::RetryExecutor;
use super::timeout::TimeoutTool;
use crate::tools::{ExecResult, Tool};

type GuardedTool = Arc<CircuitBreakerTool<Box<dyn Tool>>>;

/// One entry point guarding a single dependency
///
/// Layering, innermost first: caller tool, optional per-attempt timeout,
/// circuit breaker, retry. Every retry attempt passes through the breaker, so
/// once it opens the remaining attempts stop without touching the tool.
pub struct RobustToolExecutor {
    breaker: GuardedTool,
    retry: RetryExecutor<GuardedTool>,
}

impl RobustToolExecutor {
    pub fn new<T: Tool + 'static>(tool: T, config: RobustConfig) -> Result<Self, ConfigError> {
        debug!(tool = %tool.name(), ?config, "RobustToolExecutor::new: called");
        config.validate()?;

        let tool: Box<dyn Tool> = match config.timeout() {
            Some(timeout) => Box::new(TimeoutTool::new(tool, timeout)),
            None => Box::new(tool),
        };
        let breaker = Arc::new(CircuitBreakerTool::new(tool, config.breaker)?);
        let retry = RetryExecutor::new(breaker.clone(), config.retry)?;

        Ok(Self { breaker, retry })
    }

    /// Build from separate retry and breaker policies, without a timeout
    pub fn with_policies<T: Tool + 'static>(
        tool: T,
        retry: RetryConfig,
        breaker: CircuitBreakerConfig,
    ) -> Result<Self, ConfigError> {
        Self::new(
            tool,
            RobustConfig {
                retry,
                breaker,
                timeout_ms: None,
            },
        )
    }

    pub fn tool_name(&self) -> &str {
        self.breaker.name()
    }

    /// Run the guarded tool under the full policy
    pub async fn execute(&self, input: Value) -> ExecResult {
        let call_id = Uuid::now_v7();
        let span = info_span!("robust_execute", tool = %self.tool_name(), %call_id);
        self.retry.execute(input).instrument(span).await
    }

    /// Snapshot of the breaker
    pub fn circuit_state(&self) -> CircuitBreakerState {
        self.breaker.state()
    }

    /// Force the breaker closed
    pub fn reset_circuit(&self) {
        self.breaker.reset()
    }
}
