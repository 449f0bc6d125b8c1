//! Escalation judge: reconciliation guidance for contested fields.
//!
//! Runs only on outcomes the deterministic escalation policy in
//! groundcheck-core routed here. Its output augments a flag's fix text
//! with a preferred value and a clarifying question; the flag itself,
//! and the form value, are never changed. If the judge fails, the
//! original flag stands untouched.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use groundcheck_core::{Citation, EvidenceSnippet, GroundingOutcome, ReconciliationSuggestion};

use crate::prompts::{fence_snippet, ESCALATION_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Errors from the escalation judge.
#[derive(Error, Debug)]
pub enum EscalationError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed escalation response: {0}")]
    MalformedResponse(String),
}

/// Input to the escalation judge.
#[derive(Debug, Clone)]
pub struct EscalationRequest {
    pub field_id: String,
    pub field_label: String,
    pub claimed_value: Option<String>,
    pub outcome: GroundingOutcome,
    pub snippets: Vec<EvidenceSnippet>,
}

/// Produces reconciliation guidance for a contested field.
#[async_trait]
pub trait EscalationJudge: Send + Sync {
    async fn reconcile(
        &self,
        request: &EscalationRequest,
    ) -> Result<ReconciliationSuggestion, EscalationError>;
}

/// LLM-backed escalation judge.
pub struct LlmEscalationJudge {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl LlmEscalationJudge {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    fn build_user_message(request: &EscalationRequest) -> String {
        let claimed = request.claimed_value.as_deref().unwrap_or("(blank)");
        let mut message = format!(
            "Field: {} ({})\nValue on form: {}\nValues asserted by documents: {}\n\nDocument snippets:\n",
            request.field_label,
            request.field_id,
            claimed,
            request.outcome.candidate_values.join(", "),
        );
        for snippet in &request.snippets {
            message.push_str(&format!(
                "\n{}\n",
                fence_snippet(&snippet.chunk_id, &snippet.text)
            ));
        }
        message
    }
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    preferred_value: String,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
    clarifying_question: String,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    chunk_id: String,
    quote: String,
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn validate_citations(raw: Vec<RawCitation>, snippets: &[EvidenceSnippet]) -> Vec<Citation> {
    raw.into_iter()
        .filter_map(|citation| {
            let snippet = snippets.iter().find(|s| s.chunk_id == citation.chunk_id)?;
            let quote_norm = normalize_whitespace(&citation.quote);
            if quote_norm.is_empty()
                || !normalize_whitespace(&snippet.text).contains(&quote_norm)
            {
                tracing::warn!(chunk_id = %citation.chunk_id, "Dropping unverifiable escalation citation");
                return None;
            }
            Some(snippet.cite(citation.quote))
        })
        .collect()
}

fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

#[async_trait]
impl EscalationJudge for LlmEscalationJudge {
    async fn reconcile(
        &self,
        request: &EscalationRequest,
    ) -> Result<ReconciliationSuggestion, EscalationError> {
        let messages = vec![
            ChatMessage::system(ESCALATION_SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_message(request)),
        ];

        let response = self.provider.complete(messages, &self.config).await?;

        let raw: RawSuggestion = serde_json::from_str(extract_json(&response.content))
            .map_err(|e| EscalationError::MalformedResponse(e.to_string()))?;

        // The preferred value must come from the evidence or the form,
        // never be invented by the model.
        let mut known_values = request
            .outcome
            .candidate_values
            .iter()
            .map(String::as_str)
            .chain(request.claimed_value.as_deref());
        if !known_values.any(|v| !groundcheck_core::values::materially_differ(v, &raw.preferred_value))
        {
            return Err(EscalationError::MalformedResponse(format!(
                "Preferred value '{}' not present in form or evidence",
                raw.preferred_value
            )));
        }

        Ok(ReconciliationSuggestion {
            preferred_value: raw.preferred_value,
            rationale: raw.rationale,
            citations: validate_citations(raw.citations, &request.snippets),
            clarifying_question: raw.clarifying_question,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundcheck_core::{DocType, GroundingVerdict};
    use crate::providers::{CompletionResponse, TokenUsage};
    use parking_lot::Mutex;

    struct ScriptedProvider {
        responses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            _messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Err(ProviderError::HttpError("script exhausted".into()));
            }
            Ok(CompletionResponse {
                content: responses.remove(0),
                usage: TokenUsage::default(),
                model: "scripted".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn snippet(chunk_id: &str, text: &str) -> EvidenceSnippet {
        EvidenceSnippet {
            doc_id: "doc-1".to_string(),
            doc_type: DocType::Lease,
            filename: "lease.pdf".to_string(),
            chunk_id: chunk_id.to_string(),
            page: 1,
            text: text.to_string(),
            score: 1.0,
            extraction_confidence: 0.9,
        }
    }

    fn contested_request() -> EscalationRequest {
        EscalationRequest {
            field_id: "monthly_rent".to_string(),
            field_label: "Monthly rent".to_string(),
            claimed_value: Some("$1,650".to_string()),
            outcome: GroundingOutcome {
                field_id: "monthly_rent".to_string(),
                verdict: GroundingVerdict::Contradicted,
                reason: "Documents disagree.".to_string(),
                supporting: vec![],
                contradicting: vec![],
                candidate_values: vec!["$1,650".to_string(), "$1,800".to_string()],
                min_extraction_confidence: 0.9,
            },
            snippets: vec![
                snippet("lease-1:0", "Monthly rent is $1,800 effective June 1."),
                snippet("ledger-1:0", "Rent charged: $1,650"),
            ],
        }
    }

    fn judge(response: &str) -> LlmEscalationJudge {
        LlmEscalationJudge::new(
            Arc::new(ScriptedProvider {
                responses: Mutex::new(vec![response.to_string()]),
            }),
            CompletionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_reconciliation_with_valid_citation() {
        let response = r#"{
            "preferred_value": "$1,800",
            "rationale": "The signed lease is the most recent authoritative document.",
            "citations": [
                { "chunk_id": "lease-1:0", "quote": "Monthly rent is $1,800 effective June 1." }
            ],
            "clarifying_question": "Did your rent increase to $1,800 in June?"
        }"#;
        let suggestion = judge(response).reconcile(&contested_request()).await.unwrap();
        assert_eq!(suggestion.preferred_value, "$1,800");
        assert_eq!(suggestion.citations.len(), 1);
        assert!(!suggestion.clarifying_question.is_empty());
    }

    #[tokio::test]
    async fn test_invented_value_is_rejected() {
        // $1,725 appears nowhere in form or evidence.
        let response = r#"{
            "preferred_value": "$1,725",
            "rationale": "Splitting the difference.",
            "citations": [],
            "clarifying_question": "Is your rent $1,725?"
        }"#;
        let result = judge(response).reconcile(&contested_request()).await;
        assert!(matches!(result, Err(EscalationError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unverifiable_citation_is_dropped_but_suggestion_stands() {
        let response = r#"{
            "preferred_value": "$1,800",
            "rationale": "Lease governs.",
            "citations": [
                { "chunk_id": "lease-1:0", "quote": "rent will be one thousand eight hundred" }
            ],
            "clarifying_question": "Did your rent change recently?"
        }"#;
        let suggestion = judge(response).reconcile(&contested_request()).await.unwrap();
        assert!(suggestion.citations.is_empty());
        assert_eq!(suggestion.preferred_value, "$1,800");
    }
}
