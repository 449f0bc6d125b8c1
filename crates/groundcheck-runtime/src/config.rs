//! Runtime configuration.
//!
//! Everything the orchestrator needs to know about concurrency, time
//! limits, models, and caching. Loaded from JSON or built in code;
//! defaults are safe for interactive preview audits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

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

/// Cache sizing for grounding outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_entries: u64,

    /// Time-to-live for cached outcomes (in seconds).
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Configuration for the audit runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum grounding checks in flight at once.
    pub max_concurrent_checks: usize,

    /// Time limit for one field's grounding check (in seconds).
    #[serde(with = "duration_secs")]
    pub check_timeout: Duration,

    /// Time limit for the whole audit (in seconds). A timeout fails the
    /// request; no partial report is produced.
    #[serde(with = "duration_secs")]
    pub audit_timeout: Duration,

    /// Model for grounding verdicts.
    pub grounding_model: String,

    /// Model for escalation and reconciliation.
    pub escalation_model: String,

    /// Model for field suggestions.
    pub suggestion_model: String,

    pub cache: CacheConfig,

    pub circuit_breaker: crate::resilience::CircuitBreakerConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 4,
            check_timeout: Duration::from_secs(15),
            audit_timeout: Duration::from_secs(60),
            grounding_model: "claude-sonnet-4-5-20250514".to_string(),
            escalation_model: "claude-sonnet-4-5-20250514".to_string(),
            suggestion_model: "claude-sonnet-4-5-20250514".to_string(),
            cache: CacheConfig::default(),
            circuit_breaker: crate::resilience::CircuitBreakerConfig::default(),
        }
    }
}
