//! Scripted tool - replays a fixed sequence of outcomes
//!
//! Stands in for a flaky dependency in simulations and tests. Once the
//! script runs out the last outcome repeats forever.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::tools::{ErrorKind, InvokeError, Tool, ToolError};

/// One scripted call result
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Return this value
    Ok(Value),
    /// Fail with a conventional error of this kind
    Fail(ErrorKind),
    /// Fail with exactly this error
    Error(ToolError),
    /// Fail without a classification
    Other(String),
}

/// A tool whose behaviour is given up front
pub struct ScriptedTool {
    name: String,
    script: Vec<Outcome>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedTool {
    pub fn new(name: impl Into<String>, script: Vec<Outcome>) -> Self {
        Self {
            name: name.into(),
            script,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always_ok(name: impl Into<String>, value: Value) -> Self {
        Self::new(name, vec![Outcome::Ok(value)])
    }

    pub fn always_fail(name: impl Into<String>, kind: ErrorKind) -> Self {
        Self::new(name, vec![Outcome::Fail(kind)])
    }

    /// Fail `failures` times with `kind`, then succeed with `value`
    pub fn failing_then_ok(name: impl Into<String>, kind: ErrorKind, failures: usize, value: Value) -> Self {
        let mut script = vec![Outcome::Fail(kind); failures];
        script.push(Outcome::Ok(value));
        Self::new(name, script)
    }

    /// Sleep this long before producing each outcome
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of times the tool has been invoked
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outcome_for(&self, call: usize) -> Option<&Outcome> {
        self.script.get(call).or_else(|| self.script.last())
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(tool = %self.name, call = call + 1, "ScriptedTool::invoke: called");

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.outcome_for(call) {
            None => Ok(Value::Null),
            Some(Outcome::Ok(value)) => Ok(value.clone()),
            Some(Outcome::Fail(kind)) => Err(ToolError::new(
                *kind,
                self.name.as_str(),
                format!("scripted {} failure on call {}", kind, call + 1),
            )
            .with_input(input)
            .into()),
            Some(Outcome::Error(err)) => Err(err.clone().into()),
            Some(Outcome::Other(message)) => Err(eyre::eyre!("{}", message).into()),
        }
    }
}
