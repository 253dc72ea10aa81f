//! Simulation - drive a scripted flaky tool through a robust executor

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::resilience::{CircuitState, ConfigError, RobustConfig, RobustToolExecutor};
use crate::tools::builtin::{Outcome, ScriptedTool};
use crate::tools::{ErrorKind, ExecResult, ToolError};

/// Name the simulated tool reports
pub const SIMULATED_TOOL: &str = "flaky";

/// What the scripted tool does
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Leading calls that fail
    pub failures: usize,
    pub kind: ErrorKind,
    pub retry_after: Option<Duration>,
    pub latency: Option<Duration>,
    /// Executions to run
    pub calls: usize,
    pub concurrent: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            failures: 2,
            kind: ErrorKind::Network,
            retry_after: None,
            latency: None,
            calls: 1,
            concurrent: false,
        }
    }
}

impl Scenario {
    fn build_tool(&self) -> ScriptedTool {
        let mut script: Vec<Outcome> = (0..self.failures).map(|_| self.failure()).collect();
        script.push(Outcome::Ok(json!(format!("Success after {} attempts", self.failures + 1))));

        let tool = ScriptedTool::new(SIMULATED_TOOL, script);
        match self.latency {
            Some(latency) => tool.with_latency(latency),
            None => tool,
        }
    }

    fn failure(&self) -> Outcome {
        match self.retry_after {
            Some(retry_after) => Outcome::Error(
                ToolError::new(self.kind, SIMULATED_TOOL, format!("scripted {} failure", self.kind))
                    .with_retry_after(retry_after),
            ),
            None => Outcome::Fail(self.kind),
        }
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub call: usize,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub circuit_rejected: bool,
}

impl ExecutionReport {
    fn from_result(call: usize, result: ExecResult) -> Self {
        match result {
            Ok(value) => Self {
                call,
                ok: true,
                value: Some(value),
                error: None,
                kind: None,
                circuit_rejected: false,
            },
            Err(err) => Self {
                call,
                ok: false,
                value: None,
                error: Some(err.to_string()),
                kind: err.kind(),
                circuit_rejected: err.is_circuit_open(),
            },
        }
    }
}

/// Summary of a whole simulation
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub executions: Vec<ExecutionReport>,
    /// Times the scripted tool itself was invoked
    pub tool_calls: usize,
    pub circuit_state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub elapsed_ms: u64,
}

/// Run `scenario` under `config`
pub async fn run(scenario: &Scenario, config: RobustConfig) -> Result<SimulationReport, ConfigError> {
    debug!(?scenario, "simulate::run: called");
    let tool = Arc::new(scenario.build_tool());
    let executor = RobustToolExecutor::new(tool.clone(), config)?;
    let start = Instant::now();

    let results: Vec<ExecResult> = if scenario.concurrent {
        join_all((0..scenario.calls).map(|i| executor.execute(json!({ "call": i + 1 })))).await
    } else {
        let mut results = Vec::with_capacity(scenario.calls);
        for i in 0..scenario.calls {
            results.push(executor.execute(json!({ "call": i + 1 })).await);
        }
        results
    };

    let state = executor.circuit_state();
    let report = SimulationReport {
        executions: results
            .into_iter()
            .enumerate()
            .map(|(i, result)| ExecutionReport::from_result(i + 1, result))
            .collect(),
        tool_calls: tool.calls(),
        circuit_state: state.state,
        failure_count: state.failure_count,
        success_count: state.success_count,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        tool_calls = report.tool_calls,
        circuit = %report.circuit_state,
        "Simulation finished"
    );
    Ok(report)
}
