//! Field suggestions from uploaded evidence.
//!
//! Given an empty field, retrieve the most relevant snippets and ask
//! the model to propose a value, with citations and a calibrated
//! confidence label. Suggestions have no degraded mode: without a
//! working provider the call fails, it never guesses.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use groundcheck_core::{Citation, EvidenceSnippet, FieldSpec, FormSchema, FormState};

use crate::prompts::{fence_snippet, SUGGESTION_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};
use crate::retriever::{EvidenceRetriever, RetrievalRequest, RetrieverError};

/// Errors from field suggestion.
#[derive(Error, Debug)]
pub enum SuggestError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Retriever error: {0}")]
    Retriever(#[from] RetrieverError),

    #[error("Malformed suggestion response: {0}")]
    MalformedResponse(String),
}

/// Human-facing confidence band for a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
    #[serde(rename = "Very Low")]
    VeryLow,
}

impl ConfidenceLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceLabel::High
        } else if score >= 0.5 {
            ConfidenceLabel::Medium
        } else if score >= 0.25 {
            ConfidenceLabel::Low
        } else {
            ConfidenceLabel::VeryLow
        }
    }
}

/// A proposed value for one field. `value` is `None` when the
/// documents do not state one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSuggestion {
    pub field_id: String,
    pub value: Option<String>,
    pub confidence: f64,
    pub label: ConfidenceLabel,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl FieldSuggestion {
    fn empty(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: None,
            confidence: 0.0,
            label: ConfidenceLabel::VeryLow,
            citations: Vec::new(),
        }
    }
}

/// Suggests values for empty fields from uploaded evidence.
pub struct FieldSuggester {
    retriever: Arc<dyn EvidenceRetriever>,
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    top_k: usize,
}

impl FieldSuggester {
    pub fn new(
        retriever: Arc<dyn EvidenceRetriever>,
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            retriever,
            provider,
            config,
            top_k: 5,
        }
    }

    /// Suggest a value for one field.
    pub async fn suggest(
        &self,
        schema: &FormSchema,
        field_id: &str,
    ) -> Result<FieldSuggestion, SuggestError> {
        let field = schema
            .field(field_id)
            .ok_or_else(|| SuggestError::UnknownField(field_id.to_string()))?;

        let snippets = self
            .retriever
            .retrieve(&RetrievalRequest {
                field_id: field.id.clone(),
                query: field.label.clone(),
                claimed_value: None,
                doc_type_priority: field.candidate_doc_types.clone(),
                allowed_doc_ids: None,
                top_k: self.top_k,
            })
            .await?;

        if snippets.is_empty() {
            return Ok(FieldSuggestion::empty(&field.id));
        }

        let messages = vec![
            ChatMessage::system(SUGGESTION_SYSTEM_PROMPT),
            ChatMessage::user(build_user_message(field, &snippets)),
        ];
        let response = self.provider.complete(messages, &self.config).await?;

        let raw: RawSuggestion = serde_json::from_str(extract_json(&response.content))
            .map_err(|e| SuggestError::MalformedResponse(e.to_string()))?;

        let citations = validate_citations(raw.citations, &snippets);
        // A value with no verifiable citation is a guess; discard it.
        let (value, confidence) = match raw.value {
            Some(v) if !citations.is_empty() => (Some(v), raw.confidence.clamp(0.0, 1.0)),
            _ => (None, 0.0),
        };

        Ok(FieldSuggestion {
            field_id: field.id.clone(),
            label: ConfidenceLabel::from_score(confidence),
            value,
            confidence,
            citations,
        })
    }

    /// Suggest values for every empty field in the form.
    pub async fn suggest_all(
        &self,
        schema: &FormSchema,
        form: &FormState,
    ) -> Result<Vec<FieldSuggestion>, SuggestError> {
        let mut suggestions = Vec::new();
        for field in &schema.fields {
            if form.is_filled(&field.id) {
                continue;
            }
            suggestions.push(self.suggest(schema, &field.id).await?);
        }
        Ok(suggestions)
    }
}

fn build_user_message(field: &FieldSpec, snippets: &[EvidenceSnippet]) -> String {
    let mut message = format!(
        "Field: {} ({})\nField type: {:?}\n\nDocument snippets:\n",
        field.label, field.id, field.field_type
    );
    for snippet in snippets {
        message.push_str(&format!(
            "\n{}\n",
            fence_snippet(&snippet.chunk_id, &snippet.text)
        ));
    }
    message
}

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    value: Option<String>,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    chunk_id: String,
    quote: String,
}

fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
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
                tracing::warn!(chunk_id = %citation.chunk_id, "Dropping unverifiable suggestion citation");
                return None;
            }
            Some(snippet.cite(citation.quote))
        })
        .collect()
}
