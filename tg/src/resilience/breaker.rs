//! Circuit breaker tool
//!
//! ```text
//! Closed ──[failure_threshold monitored failures]──> Open
//!   ▲                                                  │
//!   │                                                  │ [cool-down elapsed, next call]
//!   │                                                  ▼
//!   └────[success_threshold successes]──────────── HalfOpen
//!                  [monitored failure] ──────────────> Open
//! ```

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CircuitBreakerConfig, ConfigError};
use crate::tools::{CircuitBreakerError, ExecError, InvokeError, Tool};

/// Breaker position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow through
    Closed,
    /// Calls are rejected until the cool-down elapses
    Open,
    /// Trial calls decide whether to close or reopen
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Read-only snapshot of a breaker
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    /// When the breaker last opened; cleared when it closes
    pub opened_at: Option<Instant>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
        }
    }
}

/// Internal state protected by mutex
#[derive(Debug, Default)]
struct BreakerInner {
    snapshot: CircuitBreakerState,
    /// A half-open trial call is running
    probe_in_flight: bool,
    /// Bumped on every transition; outcomes from an older generation are dropped
    generation: u64,
}

impl BreakerInner {
    fn transition(&mut self, to: CircuitState) {
        self.snapshot.state = to;
        self.generation += 1;
        self.probe_in_flight = false;
    }
}

/// The lock is only held for bookkeeping, never across an await
fn lock(inner: &Mutex<BreakerInner>) -> MutexGuard<'_, BreakerInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ticket handed out when a call is admitted
///
/// A trial permit dropped without an outcome (the call was cancelled) frees
/// the half-open slot so the next caller can run the trial instead.
struct Permit<'a> {
    breaker: &'a str,
    inner: &'a Mutex<BreakerInner>,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.settled || !self.probe {
            return;
        }

        let mut inner = lock(self.inner);
        if inner.generation == self.generation && inner.snapshot.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            debug!(breaker = %self.breaker, "Permit::drop: trial call abandoned, slot freed");
        }
    }
}

/// Gates calls to a tool behind a closed/open/half-open state machine
pub struct CircuitBreakerTool<T> {
    name: String,
    tool: T,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl<T: Tool> CircuitBreakerTool<T> {
    /// Create a breaker named after the wrapped tool
    pub fn new(tool: T, config: CircuitBreakerConfig) -> Result<Self, ConfigError> {
        debug!(tool = %tool.name(), ?config, "CircuitBreakerTool::new: called");
        config.validate()?;
        Ok(Self {
            name: tool.name().to_string(),
            tool,
            config,
            inner: Mutex::new(BreakerInner::default()),
        })
    }

    /// Override the breaker name reported in rejections
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn breaker_name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state snapshot
    pub fn state(&self) -> CircuitBreakerState {
        lock(&self.inner).snapshot.clone()
    }

    /// Force the breaker closed with zeroed counters
    pub fn reset(&self) {
        debug!(breaker = %self.name, "CircuitBreakerTool::reset: called");
        let mut inner = lock(&self.inner);
        inner.transition(CircuitState::Closed);
        inner.snapshot = CircuitBreakerState::default();
        info!(breaker = %self.name, "Circuit manually reset to closed");
    }

    fn permit(&self, generation: u64, probe: bool) -> Permit<'_> {
        Permit {
            breaker: &self.name,
            inner: &self.inner,
            generation,
            probe,
            settled: false,
        }
    }

    fn admit(&self) -> Result<Permit<'_>, CircuitBreakerError> {
        let mut inner = lock(&self.inner);

        match inner.snapshot.state {
            CircuitState::Closed => Ok(self.permit(inner.generation, false)),
            CircuitState::Open => {
                let cool_down = self.config.cool_down();
                let elapsed = inner.snapshot.opened_at.map(|t| t.elapsed()).unwrap_or(cool_down);

                if elapsed < cool_down {
                    debug!(breaker = %self.name, ?elapsed, "CircuitBreakerTool::admit: open, rejecting");
                    return Err(self.rejection(CircuitState::Open, Some(cool_down - elapsed)));
                }

                inner.transition(CircuitState::HalfOpen);
                inner.snapshot.success_count = 0;
                inner.probe_in_flight = true;
                info!(breaker = %self.name, "Circuit half-open, admitting trial call");
                Ok(self.permit(inner.generation, true))
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    debug!(breaker = %self.name, "CircuitBreakerTool::admit: trial in flight, rejecting");
                    return Err(self.rejection(CircuitState::HalfOpen, None));
                }
                inner.probe_in_flight = true;
                Ok(self.permit(inner.generation, true))
            }
        }
    }

    fn rejection(&self, state: CircuitState, retry_in: Option<Duration>) -> CircuitBreakerError {
        CircuitBreakerError {
            breaker: self.name.clone(),
            state,
            retry_in,
        }
    }

    fn record_success(&self, mut permit: Permit<'_>) {
        permit.settled = true;
        let mut inner = lock(&self.inner);
        if inner.generation != permit.generation {
            debug!(breaker = %self.name, "CircuitBreakerTool::record_success: stale outcome ignored");
            return;
        }

        match inner.snapshot.state {
            CircuitState::Closed => inner.snapshot.failure_count = 0,
            CircuitState::HalfOpen if permit.probe => {
                inner.probe_in_flight = false;
                inner.snapshot.success_count += 1;
                if inner.snapshot.success_count >= self.config.success_threshold {
                    inner.transition(CircuitState::Closed);
                    inner.snapshot = CircuitBreakerState::default();
                    info!(breaker = %self.name, "Circuit closed after successful trial calls");
                }
            }
            _ => {}
        }
    }

    fn record_failure(&self, mut permit: Permit<'_>, err: &ExecError) {
        permit.settled = true;
        let mut inner = lock(&self.inner);
        if inner.generation != permit.generation {
            debug!(breaker = %self.name, "CircuitBreakerTool::record_failure: stale outcome ignored");
            return;
        }

        let monitored = err.kind().is_some_and(|kind| self.config.is_monitored(kind));

        match inner.snapshot.state {
            CircuitState::Closed if monitored => {
                inner.snapshot.failure_count += 1;
                if inner.snapshot.failure_count >= self.config.failure_threshold {
                    inner.transition(CircuitState::Open);
                    inner.snapshot.opened_at = Some(Instant::now());
                    warn!(
                        breaker = %self.name,
                        failures = inner.snapshot.failure_count,
                        cool_down = ?self.config.cool_down(),
                        "Circuit opened"
                    );
                }
            }
            CircuitState::HalfOpen if permit.probe => {
                inner.probe_in_flight = false;
                if monitored {
                    inner.transition(CircuitState::Open);
                    inner.snapshot.opened_at = Some(Instant::now());
                    inner.snapshot.success_count = 0;
                    warn!(breaker = %self.name, "Trial call failed, circuit reopened");
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl<T: Tool> Tool for CircuitBreakerTool<T> {
    fn name(&self) -> &str {
        self.tool.name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        debug!(breaker = %self.name, "CircuitBreakerTool::invoke: called");
        let permit = self.admit()?;

        match self.tool.invoke(input).await {
            Ok(value) => {
                self.record_success(permit);
                Ok(value)
            }
            Err(e) => {
                let err = e.into_exec_error(self.tool.name());
                self.record_failure(permit, &err);
                Err(err.into())
            }
        }
    }
}
