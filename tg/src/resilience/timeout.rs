//! Per-call deadline as a tool decorator

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::tools::{InvokeError, Tool, ToolError};

/// Fails a call with a recoverable timeout error once `timeout` elapses
///
/// The wrapped future is dropped on expiry; side effects it already started
/// are not rolled back.
pub struct TimeoutTool<T> {
    tool: T,
    timeout: Duration,
}

impl<T: Tool> TimeoutTool<T> {
    pub fn new(tool: T, timeout: Duration) -> Self {
        Self { tool, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<T: Tool> Tool for TimeoutTool<T> {
    fn name(&self) -> &str {
        self.tool.name()
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        debug!(tool = %self.tool.name(), timeout = ?self.timeout, "TimeoutTool::invoke: called");
        match tokio::time::timeout(self.timeout, self.tool.invoke(input.clone())).await {
            Ok(result) => result,
            Err(_) => {
                warn!(tool = %self.tool.name(), timeout = ?self.timeout, "Tool call timed out");
                Err(ToolError::deadline_exceeded(self.tool.name(), self.timeout)
                    .with_input(input)
                    .into())
            }
        }
    }
}
