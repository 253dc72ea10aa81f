//! Tool abstraction
//!
//! A tool is a named async operation over JSON values. Tools fail with a
//! classified [`ToolError`]; executors report every outcome as an
//! [`ExecResult`] instead of letting failures escape unclassified.

mod error;
mod executor;
mod traits;

pub mod builtin;

pub use error::{CircuitBreakerError, ErrorKind, ExecError, ExecResult, InvokeError, ToolError};
pub use executor::ToolExecutor;
pub use traits::Tool;
