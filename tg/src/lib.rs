//! toolguard - resilience layer for async agent tools
//!
//! Sits between a caller and a fallible, asynchronous unit of work (a tool)
//! and applies failure policy around it: bounded retries with backoff, a
//! circuit breaker that stops hammering a dependency under sustained failure,
//! and per-call deadlines. Outcomes are reported as [`ExecResult`] values
//! rather than escaping as unclassified errors.
//!
//! # Modules
//!
//! - [`tools`] - Tool trait, error taxonomy and the single-call executor
//! - [`resilience`] - Circuit breaker, retry, timeout and their composition
//! - [`simulate`] - Drive a scripted flaky tool through a policy
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use toolguard::{RobustConfig, RobustToolExecutor};
//!
//! let executor = RobustToolExecutor::new(my_tool, RobustConfig::default())?;
//! match executor.execute(serde_json::json!({"q": "rust"})).await {
//!     Ok(value) => println!("{value}"),
//!     Err(e) => eprintln!("gave up: {e}"),
//! }
//! ```

pub mod cli;
pub mod config;
pub mod resilience;
pub mod simulate;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use resilience::{
    CircuitBreakerConfig, CircuitBreakerState, CircuitBreakerTool, CircuitState, ConfigError, RetryConfig,
    RetryExecutor, RobustConfig, RobustToolExecutor, TimeoutTool,
};
pub use tools::{
    CircuitBreakerError, ErrorKind, ExecError, ExecResult, InvokeError, Tool, ToolError, ToolExecutor,
};
