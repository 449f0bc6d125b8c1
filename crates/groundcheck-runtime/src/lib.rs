//! # groundcheck-runtime
//!
//! Async audit runtime on top of `groundcheck-core`: evidence
//! retrieval, the LLM grounding and escalation judges, field
//! suggestions, and the orchestrator that ties an audit together.
//!
//! ## Important
//!
//! The deterministic checks live in `groundcheck-core` and never make
//! LLM calls. This crate is where network and model access happen, and
//! every LLM output is validated for referential integrity before it
//! can influence a report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use groundcheck_core::{AuditPolicy, FormSchema};
//! use groundcheck_runtime::{
//!     AuditOrchestrator, AuditRequest, InMemoryRetriever, RuntimeConfig,
//! };
//!
//! let orchestrator = AuditOrchestrator::new(
//!     FormSchema::builtin(),
//!     AuditPolicy::default(),
//!     RuntimeConfig::default(),
//!     Arc::new(InMemoryRetriever::new(documents)),
//! );
//! let report = orchestrator.run_audit(&AuditRequest::default()).await?;
//! ```

pub mod cache;
pub mod config;
pub mod escalation;
pub mod judge;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod retriever;
pub mod suggest;

pub use cache::{GroundingCache, GroundingCacheKey};
pub use config::{CacheConfig, RuntimeConfig};
pub use escalation::{EscalationError, EscalationJudge, EscalationRequest, LlmEscalationJudge};
pub use judge::{GroundingJudge, JudgeError, JudgeRequest, LlmGroundingJudge};
pub use orchestrator::{AuditError, AuditOrchestrator, AuditRequest};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry, TokenUsage,
};
pub use resilience::{CircuitBreaker, CircuitBreakerConfig, ServiceKind};
pub use retriever::{EvidenceRetriever, InMemoryRetriever, RetrievalRequest, RetrieverError};
pub use suggest::{ConfidenceLabel, FieldSuggester, FieldSuggestion, SuggestError};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicProvider, AnthropicProviderFactory};
