//! ToolExecutor - runs a single tool and reports the outcome as a result

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::{ExecResult, Tool, ToolError};

/// Runs one tool, turning every failure into an [`ExecResult`]
pub struct ToolExecutor<T> {
    tool: T,
}

impl<T: Tool> ToolExecutor<T> {
    pub fn new(tool: T) -> Self {
        Self { tool }
    }

    /// Name of the wrapped tool
    pub fn tool_name(&self) -> &str {
        self.tool.name()
    }

    /// Invoke the tool once
    pub async fn execute(&self, input: Value) -> ExecResult {
        debug!(tool = %self.tool.name(), "ToolExecutor::execute: called");
        self.tool
            .invoke(input)
            .await
            .map_err(|e| e.into_exec_error(self.tool.name()))
    }

    /// Invoke the tool once, giving up after `timeout`
    ///
    /// The in-flight call is dropped on expiry. Whatever the tool had already
    /// started may still complete on its own.
    pub async fn execute_with_timeout(&self, input: Value, timeout: Duration) -> ExecResult {
        debug!(tool = %self.tool.name(), ?timeout, "ToolExecutor::execute_with_timeout: called");
        match tokio::time::timeout(timeout, self.execute(input.clone())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %self.tool.name(), ?timeout, "ToolExecutor::execute_with_timeout: deadline exceeded");
                Err(ToolError::deadline_exceeded(self.tool.name(), timeout)
                    .with_input(input)
                    .into())
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.tool
    }
}
