//! Resilience patterns for groundcheck-runtime.
//!
//! A circuit breaker per LLM-backed service stops a failing model
//! endpoint from stalling every audit.

mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, ServiceKind};
