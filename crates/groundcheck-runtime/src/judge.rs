//! Grounding judge: does the evidence support the claimed value?
//!
//! The LLM produces EVIDENCE, not VERDICT severity. Its JSON output is
//! validated for referential integrity before anything downstream sees
//! it: every citation must name a snippet that was actually provided,
//! and every quote must appear verbatim in that snippet. Citations that
//! fail validation are dropped; a "supported" verdict left with no
//! valid supporting citation degrades to unsupported.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use groundcheck_core::{Citation, EvidenceSnippet, GroundingOutcome, GroundingVerdict};

use crate::prompts::{fence_snippet, GROUNDING_SYSTEM_PROMPT};
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Errors from the grounding judge.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed judge response: {0}")]
    MalformedResponse(String),
}

/// One field's grounding request.
#[derive(Debug, Clone)]
pub struct JudgeRequest {
    pub field_id: String,
    pub field_label: String,
    pub claimed_value: String,
    pub snippets: Vec<EvidenceSnippet>,
}

/// Produces a grounding outcome for one field.
#[async_trait]
pub trait GroundingJudge: Send + Sync {
    async fn ground(&self, request: &JudgeRequest) -> Result<GroundingOutcome, JudgeError>;
}

/// LLM-backed grounding judge.
pub struct LlmGroundingJudge {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl LlmGroundingJudge {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    fn build_user_message(request: &JudgeRequest) -> String {
        let mut message = format!(
            "Field: {} ({})\nClaimed value: {}\n\nDocument snippets:\n",
            request.field_label, request.field_id, request.claimed_value
        );
        for snippet in &request.snippets {
            message.push_str(&format!(
                "\n[{:?} page {} of {}]\n{}\n",
                snippet.doc_type,
                snippet.page,
                snippet.filename,
                fence_snippet(&snippet.chunk_id, &snippet.text)
            ));
        }
        message
    }
}

/// Raw wire shape of the judge's JSON response.
#[derive(Debug, Deserialize)]
struct RawJudgeResponse {
    verdict: RawVerdict,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    citations: Vec<RawCitation>,
    #[serde(default)]
    candidate_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum RawVerdict {
    Supported,
    Unsupported,
    Contradicted,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    chunk_id: String,
    quote: String,
    #[serde(default)]
    stance: RawStance,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
enum RawStance {
    #[default]
    Supports,
    Contradicts,
}

/// Strip Markdown code fences the model sometimes wraps JSON in.
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

/// Keep only citations whose quote is verbatim text of the named
/// snippet. Invalid citations are dropped, never repaired.
fn validate_citations(
    raw: Vec<RawCitation>,
    snippets: &[EvidenceSnippet],
) -> (Vec<Citation>, Vec<Citation>) {
    let mut supporting = Vec::new();
    let mut contradicting = Vec::new();

    for citation in raw {
        let Some(snippet) = snippets.iter().find(|s| s.chunk_id == citation.chunk_id) else {
            tracing::warn!(chunk_id = %citation.chunk_id, "Citation names unknown snippet, dropping");
            continue;
        };
        let quote_norm = normalize_whitespace(&citation.quote);
        if quote_norm.is_empty() || !normalize_whitespace(&snippet.text).contains(&quote_norm) {
            tracing::warn!(chunk_id = %citation.chunk_id, "Citation quote not found in snippet, dropping");
            continue;
        }
        let validated = snippet.cite(citation.quote);
        match citation.stance {
            RawStance::Supports => supporting.push(validated),
            RawStance::Contradicts => contradicting.push(validated),
        }
    }

    (supporting, contradicting)
}

#[async_trait]
impl GroundingJudge for LlmGroundingJudge {
    async fn ground(&self, request: &JudgeRequest) -> Result<GroundingOutcome, JudgeError> {
        if request.snippets.is_empty() {
            return Ok(GroundingOutcome::no_evidence(&request.field_id));
        }

        let messages = vec![
            ChatMessage::system(GROUNDING_SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_message(request)),
        ];

        let response = self.provider.complete(messages, &self.config).await?;

        let raw: RawJudgeResponse = serde_json::from_str(extract_json(&response.content))
            .map_err(|e| JudgeError::MalformedResponse(e.to_string()))?;

        let (supporting, contradicting) = validate_citations(raw.citations, &request.snippets);

        // Verdicts must survive citation validation: a claim of support
        // or contradiction with no verifiable quote is just prose.
        let verdict = match raw.verdict {
            RawVerdict::Supported if supporting.is_empty() => {
                tracing::warn!(
                    field = %request.field_id,
                    "Supported verdict had no valid citations, degrading to unsupported"
                );
                GroundingVerdict::Unsupported
            }
            RawVerdict::Contradicted if contradicting.is_empty() => {
                tracing::warn!(
                    field = %request.field_id,
                    "Contradicted verdict had no valid citations, degrading to unsupported"
                );
                GroundingVerdict::Unsupported
            }
            RawVerdict::Supported => GroundingVerdict::Supported,
            RawVerdict::Contradicted => GroundingVerdict::Contradicted,
            RawVerdict::Unsupported => GroundingVerdict::Unsupported,
        };

        let min_extraction_confidence = request
            .snippets
            .iter()
            .map(|s| s.extraction_confidence)
            .fold(1.0_f64, f64::min);

        Ok(GroundingOutcome {
            field_id: request.field_id.clone(),
            verdict,
            reason: raw.reason,
            supporting,
            contradicting,
            candidate_values: raw.candidate_values,
            min_extraction_confidence,
        })
    }
}
