//! Integration tests for toolguard
//!
//! These tests drive the public API end to end with scripted tools.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use toolguard::tools::builtin::{Outcome, ScriptedTool};
use toolguard::{
    CircuitBreakerConfig, CircuitBreakerTool, CircuitState, ErrorKind, ExecError, InvokeError, RetryConfig,
    RetryExecutor, RobustConfig, RobustToolExecutor, Tool, ToolError, ToolExecutor,
};

// =============================================================================
// Retry Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_network_failures_then_success() {
    let tool = Arc::new(ScriptedTool::failing_then_ok(
        "search",
        ErrorKind::Network,
        2,
        json!("Success after 3 attempts"),
    ));
    let retry = RetryExecutor::new(tool.clone(), RetryConfig::new(5, 10, 2.0)).expect("valid config");

    let result = retry.execute(json!({"q": "rust"})).await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), json!("Success after 3 attempts"));
    assert_eq!(tool.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_total_wait_bounded_below_by_backoff_sum() {
    let tool = Arc::new(ScriptedTool::always_fail("search", ErrorKind::Transient));
    let config = RetryConfig::new(5, 20, 2.0);
    let expected: Duration = (1..5).map(|i| config.delay_for_attempt(i)).sum();
    let retry = RetryExecutor::new(tool.clone(), config).expect("valid config");

    let start = Instant::now();
    let result = retry.execute(Value::Null).await;

    assert!(result.is_err());
    assert_eq!(expected, Duration::from_millis(20 + 40 + 80 + 160));
    assert!(start.elapsed() >= expected);
    assert_eq!(tool.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_non_recoverable_error_single_attempt() {
    let tool = Arc::new(ScriptedTool::new(
        "search",
        vec![Outcome::Error(ToolError::transient("search", "corrupt").with_recoverable(false))],
    ));
    let retry = RetryExecutor::new(tool.clone(), RetryConfig::new(10, 10, 2.0)).expect("valid config");

    let err = retry.execute(Value::Null).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Transient));
    assert_eq!(tool.calls(), 1);
}

// =============================================================================
// Circuit Breaker Scenarios
// =============================================================================

#[tokio::test]
async fn test_validation_errors_leave_breaker_closed() {
    let tool = Arc::new(ScriptedTool::always_fail("db", ErrorKind::Validation));
    let breaker = CircuitBreakerTool::new(tool.clone(), CircuitBreakerConfig::new(3, 1, 60.0)).expect("valid config");

    for _ in 0..5 {
        assert!(breaker.invoke(Value::Null).await.is_err());
    }

    let state = breaker.state();
    assert_eq!(state.state, CircuitState::Closed);
    assert_eq!(state.failure_count, 0);
    assert_eq!(tool.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_full_cycle() {
    let tool = Arc::new(ScriptedTool::new(
        "db",
        vec![
            Outcome::Fail(ErrorKind::Network),
            Outcome::Fail(ErrorKind::Network),
            Outcome::Fail(ErrorKind::Network),
            Outcome::Ok(json!("probe-1")),
            Outcome::Ok(json!("probe-2")),
            Outcome::Ok(json!("steady")),
        ],
    ));
    let breaker = CircuitBreakerTool::new(tool.clone(), CircuitBreakerConfig::new(2, 2, 10.0)).expect("valid config");

    // Closed -> Open
    breaker.invoke(Value::Null).await.unwrap_err();
    breaker.invoke(Value::Null).await.unwrap_err();
    assert_eq!(breaker.state().state, CircuitState::Open);

    // Rejected inside the cool-down
    let err = breaker.invoke(Value::Null).await.unwrap_err();
    assert!(matches!(err, InvokeError::CircuitOpen(_)));
    assert_eq!(tool.calls(), 2);

    // Half-open trial fails -> Open again
    tokio::time::advance(Duration::from_secs(10)).await;
    breaker.invoke(Value::Null).await.unwrap_err();
    assert_eq!(breaker.state().state, CircuitState::Open);
    assert_eq!(tool.calls(), 3);

    // Two successful trials -> Closed
    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(breaker.invoke(Value::Null).await.unwrap(), json!("probe-1"));
    assert_eq!(breaker.state().state, CircuitState::HalfOpen);
    assert_eq!(breaker.invoke(Value::Null).await.unwrap(), json!("probe-2"));

    let state = breaker.state();
    assert_eq!(state.state, CircuitState::Closed);
    assert_eq!(state.failure_count, 0);
    assert_eq!(state.success_count, 0);

    assert_eq!(breaker.invoke(Value::Null).await.unwrap(), json!("steady"));
}

// =============================================================================
// Robust Executor Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_robust_executor_stops_calling_once_open() {
    let tool = Arc::new(ScriptedTool::always_fail("api", ErrorKind::Network));
    let config = RobustConfig {
        retry: RetryConfig::new(3, 10, 2.0),
        breaker: CircuitBreakerConfig::new(5, 1, 60.0),
        timeout_ms: None,
    };
    let executor = RobustToolExecutor::new(tool.clone(), config).expect("valid config");

    assert!(executor.execute(Value::Null).await.is_err());
    assert!(executor.execute(Value::Null).await.is_err());
    assert_eq!(tool.calls(), 5);
    assert_eq!(executor.circuit_state().state, CircuitState::Open);

    let third = executor.execute(Value::Null).await;
    assert!(matches!(third, Err(ExecError::CircuitOpen(_))));
    assert_eq!(tool.calls(), 5);

    executor.reset_circuit();
    assert_eq!(executor.circuit_state().state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_robust_executor_recovers_after_cool_down() {
    let mut script = vec![Outcome::Fail(ErrorKind::Timeout); 2];
    script.push(Outcome::Ok(json!("back")));
    let tool = Arc::new(ScriptedTool::new("api", script));

    let executor = RobustToolExecutor::with_policies(
        tool.clone(),
        RetryConfig::new(1, 10, 2.0),
        CircuitBreakerConfig::new(2, 1, 30.0),
    )
    .expect("valid config");

    executor.execute(Value::Null).await.unwrap_err();
    executor.execute(Value::Null).await.unwrap_err();
    assert!(executor.execute(Value::Null).await.unwrap_err().is_circuit_open());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(executor.execute(Value::Null).await, Ok(json!("back")));
    assert_eq!(executor.circuit_state().state, CircuitState::Closed);
    assert_eq!(tool.calls(), 3);
}

// =============================================================================
// Custom Tool Implementations
// =============================================================================

/// Fails with an unclassified error for odd numbers
struct Parity;

#[async_trait]
impl Tool for Parity {
    fn name(&self) -> &str {
        "parity"
    }

    async fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        let n: i64 = serde_json::from_value(input).map_err(eyre::Report::from)?;
        if n % 2 == 1 {
            return Err(eyre::eyre!("{} is odd", n).into());
        }
        Ok(json!(n / 2))
    }
}

#[tokio::test]
async fn test_executor_classifies_foreign_errors() {
    let executor = ToolExecutor::new(Parity);

    assert_eq!(executor.execute(json!(8)).await, Ok(json!(4)));

    let err = executor.execute(json!(3)).await.unwrap_err();
    let tool_err = err.as_tool_error().expect("tool error");
    assert_eq!(tool_err.kind, ErrorKind::Unknown);
    assert!(!tool_err.recoverable);
    assert!(tool_err.message.contains("3 is odd"));

    let err = executor.execute(json!("x")).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Unknown));
}

#[tokio::test]
async fn test_foreign_errors_are_not_retried() {
    let retry = RetryExecutor::new(Parity, RetryConfig::new(5, 10, 2.0)).expect("valid config");
    let err = retry.execute(json!(5)).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Unknown));
}

#[tokio::test(start_paused = true)]
async fn test_executor_timeout_wraps_any_tool() {
    let slow = ScriptedTool::always_ok("slow", json!(1)).with_latency(Duration::from_secs(60));
    let executor = ToolExecutor::new(slow);

    let err = executor
        .execute_with_timeout(Value::Null, Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Timeout));
    assert_eq!(err.as_tool_error().unwrap().message, "slow timed out after 50ms");
}
