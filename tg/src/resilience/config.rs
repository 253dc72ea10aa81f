//! Resilience policy configuration

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tools::ErrorKind;

/// Rejected policy configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max-attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("backoff-multiplier must be a finite number >= 1.0, got {0}")]
    InvalidBackoffMultiplier(f64),

    #[error("{name} must be at least 1")]
    InvalidThreshold { name: &'static str },

    #[error("timeout-seconds must be a finite number >= 0, got {0}")]
    InvalidCoolDown(f64),

    #[error("timeout-ms must be greater than 0")]
    InvalidTimeout,
}

/// Retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(rename = "initial-delay-ms", default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Growth factor applied per attempt
    #[serde(rename = "backoff-multiplier", default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Randomize each delay by +/-25%
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Upper bound on computed backoff (server-directed delays are not capped)
    #[serde(rename = "max-delay-ms", default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,

    /// Kinds never retried, even when the error says it is recoverable
    #[serde(rename = "terminal-errors", default = "default_terminal_errors")]
    pub terminal_errors: BTreeSet<ErrorKind>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

fn default_terminal_errors() -> BTreeSet<ErrorKind> {
    BTreeSet::from([ErrorKind::Validation])
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            max_delay_ms: None,
            terminal_errors: default_terminal_errors(),
        }
    }
}

impl RetryConfig {
    /// Deterministic policy: no jitter, fixed attempts and base delay
    pub fn new(max_attempts: u32, initial_delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            backoff_multiplier,
            jitter: false,
            ..Default::default()
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = Some(max_delay_ms);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts);
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidBackoffMultiplier(self.backoff_multiplier));
        }
        Ok(())
    }

    /// Backoff after failed attempt `attempt` (1-based), without jitter
    ///
    /// `initial_delay_ms * backoff_multiplier^(attempt - 1)`, capped by `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let delay = millis_to_duration_saturating(ms);

        match self.max_delay_ms {
            Some(max) => delay.min(Duration::from_millis(max)),
            None => delay,
        }
    }
}

/// Whole-microsecond Duration for a millisecond value; float-to-int casts saturate
pub(crate) fn millis_to_duration_saturating(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((ms * 1000.0).round() as u64)
}

/// Circuit breaker policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive monitored failures that open the circuit
    #[serde(rename = "failure-threshold", default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close it again
    #[serde(rename = "success-threshold", default = "default_success_threshold")]
    pub success_threshold: u32,

    /// Cool-down before an open circuit admits a trial call
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: f64,

    /// Error kinds that count toward `failure_threshold`
    #[serde(rename = "monitored-errors", default = "default_monitored_errors")]
    pub monitored_errors: BTreeSet<ErrorKind>,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_success_threshold() -> u32 {
    2
}

fn default_timeout_seconds() -> f64 {
    60.0
}

fn default_monitored_errors() -> BTreeSet<ErrorKind> {
    BTreeSet::from([
        ErrorKind::Network,
        ErrorKind::Timeout,
        ErrorKind::Transient,
        ErrorKind::RateLimit,
    ])
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            timeout_seconds: default_timeout_seconds(),
            monitored_errors: default_monitored_errors(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(failure_threshold: u32, success_threshold: u32, timeout_seconds: f64) -> Self {
        Self {
            failure_threshold,
            success_threshold,
            timeout_seconds,
            monitored_errors: default_monitored_errors(),
        }
    }

    pub fn with_monitored_errors(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.monitored_errors = kinds.into_iter().collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "failure-threshold",
            });
        }
        if self.success_threshold == 0 {
            return Err(ConfigError::InvalidThreshold {
                name: "success-threshold",
            });
        }
        if !self.timeout_seconds.is_finite() || self.timeout_seconds < 0.0 {
            return Err(ConfigError::InvalidCoolDown(self.timeout_seconds));
        }
        Ok(())
    }

    /// Cool-down as a Duration
    pub fn cool_down(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or(Duration::MAX)
    }

    pub fn is_monitored(&self, kind: ErrorKind) -> bool {
        self.monitored_errors.contains(&kind)
    }
}

/// Full retry + breaker + timeout policy for one dependency
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobustConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub breaker: CircuitBreakerConfig,

    /// Per-attempt deadline, counted by the breaker as a timeout failure
    #[serde(rename = "timeout-ms", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RobustConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.validate()?;
        self.breaker.validate()?;
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(config.jitter);
        assert!(config.terminal_errors.contains(&ErrorKind::Validation));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_breaker_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.cool_down(), Duration::from_secs(60));
        assert!(config.is_monitored(ErrorKind::Network));
        assert!(config.is_monitored(ErrorKind::Timeout));
        assert!(config.is_monitored(ErrorKind::Transient));
        assert!(config.is_monitored(ErrorKind::RateLimit));
        assert!(!config.is_monitored(ErrorKind::Validation));
        assert!(!config.is_monitored(ErrorKind::Unknown));
    }

    #[test]
    fn test_retry_config_rejects_bad_values() {
        assert_eq!(
            RetryConfig::new(0, 10, 2.0).validate(),
            Err(ConfigError::InvalidMaxAttempts)
        );
        assert_eq!(
            RetryConfig::new(3, 10, 0.5).validate(),
            Err(ConfigError::InvalidBackoffMultiplier(0.5))
        );
        assert!(RetryConfig::new(3, 10, f64::NAN).validate().is_err());
        assert!(RetryConfig::new(1, 0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_breaker_config_rejects_bad_values() {
        assert!(CircuitBreakerConfig::new(0, 1, 1.0).validate().is_err());
        assert!(CircuitBreakerConfig::new(1, 0, 1.0).validate().is_err());
        assert_eq!(
            CircuitBreakerConfig::new(1, 1, -1.0).validate(),
            Err(ConfigError::InvalidCoolDown(-1.0))
        );
        assert!(CircuitBreakerConfig::new(1, 1, 0.0).validate().is_ok());
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::new(5, 100, 2.0);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::new(10, 100, 3.0).with_max_delay_ms(500);
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(9), Duration::from_millis(500));
    }

    #[test]
    fn test_robust_config_from_yaml() {
        let yaml = r#"
retry:
  max-attempts: 4
  initial-delay-ms: 50
  jitter: false
breaker:
  failure-threshold: 3
  monitored-errors: [network, timeout]
timeout-ms: 2500
"#;
        let config: RobustConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_delay_ms, 50);
        assert_eq!(config.retry.backoff_multiplier, 2.0);
        assert!(!config.retry.jitter);
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.success_threshold, 2);
        assert_eq!(
            config.breaker.monitored_errors,
            BTreeSet::from([ErrorKind::Network, ErrorKind::Timeout])
        );
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_robust_config_rejects_zero_timeout() {
        let config = RobustConfig {
            timeout_ms: Some(0),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));
    }

    proptest! {
        #[test]
        fn prop_delay_matches_formula(initial in 0u64..10_000, multiplier in 1.0f64..4.0, attempt in 1u32..8) {
            let config = RetryConfig::new(10, initial, multiplier);
            let expected = initial as f64 * multiplier.powi(attempt as i32 - 1);
            let actual = config.delay_for_attempt(attempt).as_secs_f64() * 1000.0;
            prop_assert!((actual - expected).abs() <= expected * 1e-9 + 1e-3);
        }

        #[test]
        fn prop_delay_is_non_decreasing(initial in 0u64..10_000, multiplier in 1.0f64..4.0, attempt in 1u32..20) {
            let config = RetryConfig::new(30, initial, multiplier);
            prop_assert!(config.delay_for_attempt(attempt + 1) >= config.delay_for_attempt(attempt));
        }
    }
}
