//! Circuit breaker to prevent cascade failures.
//!
//! When calls to an LLM-backed service fail repeatedly, its circuit
//! opens and subsequent audits degrade immediately instead of queueing
//! behind a dead endpoint.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The LLM-backed services guarded by circuits. Each has its own
/// circuit so grounding can degrade while suggestions stay live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Grounding,
    Escalation,
    Suggestion,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery (in seconds)
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls bypass
    Open { opened_at: Instant },

    /// Testing if circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker keyed by service.
pub struct CircuitBreaker {
    states: RwLock<HashMap<ServiceKind, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to this service should be skipped.
    pub fn is_open(&self, service: ServiceKind) -> bool {
        let states = self.states.read();
        match states.get(&service) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(service);
                    false
                } else {
                    true
                }
            }
            Some(CircuitState::HalfOpen { .. }) => false, // Allow test calls
            _ => false,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self, service: ServiceKind) {
        let mut states = self.states.write();
        match states.get(&service).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(service, CircuitState::Closed { failures: 0 });
                    tracing::info!(service = ?service, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        service,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(service, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self, service: ServiceKind) {
        let mut states = self.states.write();
        match states.get(&service).cloned() {
            Some(CircuitState::Closed { failures }) => {
                if failures + 1 >= self.config.failure_threshold {
                    states.insert(
                        service,
                        CircuitState::Open {
                            opened_at: Instant::now(),
                        },
                    );
                    tracing::warn!(
                        service = ?service,
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    states.insert(
                        service,
                        CircuitState::Closed {
                            failures: failures + 1,
                        },
                    );
                }
            }
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    service,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(service = ?service, "Circuit reopened after failed recovery attempt");
            }
            None => {
                states.insert(service, CircuitState::Closed { failures: 1 });
            }
            _ => {}
        }
    }

    fn transition_to_half_open(&self, service: ServiceKind) {
        let mut states = self.states.write();
        if matches!(states.get(&service), Some(CircuitState::Open { .. })) {
            states.insert(service, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(service = ?service, "Circuit transitioning to half-open for recovery test");
        }
    }

    /// Current state of a circuit.
    pub fn state(&self, service: ServiceKind) -> CircuitState {
        self.states
            .read()
            .get(&service)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
