//! Resilience layers for tools
//!
//! Each layer wraps a [`Tool`](crate::tools::Tool) and is itself a tool, so
//! policies compose by wrapping:
//!
//! - [`CircuitBreakerTool`] - stops calling a dependency that keeps failing
//! - [`RetryExecutor`] - re-invokes on recoverable errors with backoff
//! - [`TimeoutTool`] - bounds a single call
//! - [`RobustToolExecutor`] - retry around breaker around tool

mod breaker;
mod config;
mod retry;
mod robust;
mod timeout;

pub use breaker::{CircuitBreakerState, CircuitBreakerTool, CircuitState};
pub use config::{CircuitBreakerConfig, ConfigError, RetryConfig, RobustConfig};
pub use retry::RetryExecutor;
pub use robust::RobustToolExecutor;
pub use timeout::TimeoutTool;
