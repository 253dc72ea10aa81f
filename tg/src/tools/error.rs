//! Tool error types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::resilience::CircuitState;

/// Classification of a tool failure
///
/// Retry and circuit-breaker policies are expressed as sets of these kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, reset, DNS failure, ...
    Network,
    /// The call did not complete before its deadline
    Timeout,
    /// A temporary fault on the remote side (5xx, overloaded)
    Transient,
    /// The dependency asked us to slow down
    RateLimit,
    /// The caller sent bad input
    Validation,
    /// Credentials missing or rejected
    Authentication,
    /// The requested resource does not exist
    NotFound,
    /// Anything that did not come with a classification
    Unknown,
}

impl ErrorKind {
    /// Whether a fresh error of this kind is conventionally worth retrying
    pub fn is_recoverable_by_default(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Transient | ErrorKind::RateLimit
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Validation => "validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure raised by a tool
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{tool_name} failed ({kind}): {message}")]
pub struct ToolError {
    pub kind: ErrorKind,
    pub message: String,
    pub tool_name: String,
    /// Input of the failed call, kept for diagnostics only
    pub input: Option<Value>,
    /// Whether a retry policy may ever re-invoke for this error
    pub recoverable: bool,
    /// Server-directed delay before the next attempt
    pub retry_after: Option<Duration>,
}

impl ToolError {
    /// Create an error with the conventional recoverability for `kind`
    pub fn new(kind: ErrorKind, tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            tool_name: tool_name.into(),
            input: None,
            recoverable: kind.is_recoverable_by_default(),
            retry_after: None,
        }
    }

    pub fn network(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, tool_name, message)
    }

    pub fn timeout(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, tool_name, message)
    }

    pub fn transient(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, tool_name, message)
    }

    /// Rate limit error, optionally carrying the delay the server asked for
    pub fn rate_limited(
        tool_name: impl Into<String>,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            retry_after,
            ..Self::new(ErrorKind::RateLimit, tool_name, message)
        }
    }

    pub fn validation(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, tool_name, message)
    }

    pub fn unknown(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, tool_name, message)
    }

    /// Timeout error in the form every deadline in this crate reports
    pub fn deadline_exceeded(tool_name: &str, timeout: Duration) -> Self {
        Self::timeout(
            tool_name,
            format!("{} timed out after {}ms", tool_name, timeout.as_millis()),
        )
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// A circuit breaker refused the call without touching the wrapped tool
#[derive(Debug, Clone, PartialEq, Error)]
#[error("circuit breaker '{breaker}' is {state}, call rejected")]
pub struct CircuitBreakerError {
    pub breaker: String,
    pub state: CircuitState,
    /// Time left until the breaker admits a trial call, if known
    pub retry_in: Option<Duration>,
}

/// Failure returned by [`Tool::invoke`](super::Tool::invoke)
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitBreakerError),

    /// Any failure the tool did not classify
    #[error(transparent)]
    Other(#[from] eyre::Report),
}

impl InvokeError {
    /// Convert into the executor-facing error, classifying unknown failures
    pub fn into_exec_error(self, tool_name: &str) -> ExecError {
        match self {
            InvokeError::Tool(e) => ExecError::Tool(e),
            InvokeError::CircuitOpen(e) => ExecError::CircuitOpen(e),
            InvokeError::Other(report) => ExecError::Tool(ToolError::unknown(tool_name, format!("{report:#}"))),
        }
    }
}

impl From<ExecError> for InvokeError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Tool(e) => InvokeError::Tool(e),
            ExecError::CircuitOpen(e) => InvokeError::CircuitOpen(e),
        }
    }
}

/// Failure returned by the executors in this crate
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitBreakerError),
}

impl ExecError {
    pub fn as_tool_error(&self) -> Option<&ToolError> {
        match self {
            ExecError::Tool(e) => Some(e),
            ExecError::CircuitOpen(_) => None,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecError::CircuitOpen(_))
    }

    /// Error kind, `None` for circuit rejections
    pub fn kind(&self) -> Option<ErrorKind> {
        self.as_tool_error().map(|e| e.kind)
    }
}

/// Outcome of an executor call: exactly one of a value or an error
pub type ExecResult<T = Value> = Result<T, ExecError>;
