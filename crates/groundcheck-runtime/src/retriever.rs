//! Evidence retrieval contract.
//!
//! The orchestrator asks a retriever for the document snippets most
//! relevant to one field. Only `Ready` documents are eligible; pending,
//! processing, and errored uploads never surface here.
//!
//! [`InMemoryRetriever`] is the bundled implementation: lexical scoring
//! over ingested chunks, good enough for tests and for the CLI's local
//! document sets. Production deployments implement [`EvidenceRetriever`]
//! over their own index.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use groundcheck_core::{DocType, Document, EvidenceSnippet};

/// Errors from evidence retrieval.
#[derive(Error, Debug)]
pub enum RetrieverError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid retrieval request: {0}")]
    InvalidRequest(String),
}

/// What to retrieve evidence for.
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub field_id: String,

    /// Human label of the field; drives lexical matching.
    pub query: String,

    /// The value claimed on the form, if any.
    pub claimed_value: Option<String>,

    /// Document types likely to carry this field, most likely first.
    pub doc_type_priority: Vec<DocType>,

    /// Restrict retrieval to these documents. `None` means all ready
    /// documents.
    pub allowed_doc_ids: Option<Vec<String>>,

    /// Maximum snippets to return.
    pub top_k: usize,
}

/// Retrieves ranked evidence snippets for a field.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Vec<EvidenceSnippet>, RetrieverError>;
}

/// Lexical in-memory retriever over ingested documents.
pub struct InMemoryRetriever {
    documents: Vec<Document>,
    /// Extraction confidence per document, 1.0 when unknown.
    extraction_confidence: HashMap<String, f64>,
}

impl InMemoryRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            extraction_confidence: HashMap::new(),
        }
    }

    /// Record the ingestion extraction confidence for a document (noisy
    /// OCR scores low).
    pub fn with_extraction_confidence(mut self, doc_id: impl Into<String>, confidence: f64) -> Self {
        self.extraction_confidence.insert(doc_id.into(), confidence);
        self
    }

    fn doc_confidence(&self, doc_id: &str) -> f64 {
        self.extraction_confidence.get(doc_id).copied().unwrap_or(1.0)
    }

    fn score_chunk(request: &RetrievalRequest, text: &str) -> f64 {
        let chunk_tokens: Vec<String> = tokenize(text);
        if chunk_tokens.is_empty() {
            return 0.0;
        }

        let mut query_tokens = tokenize(&request.query);
        query_tokens.extend(tokenize(&request.field_id.replace('_', " ")));
        if let Some(claimed) = &request.claimed_value {
            query_tokens.extend(tokenize(claimed));
        }
        query_tokens.sort();
        query_tokens.dedup();
        if query_tokens.is_empty() {
            return 0.0;
        }

        let hits = query_tokens
            .iter()
            .filter(|token| chunk_tokens.contains(token))
            .count();
        hits as f64 / query_tokens.len() as f64
    }

    fn type_boost(request: &RetrievalRequest, doc_type: DocType) -> f64 {
        match request
            .doc_type_priority
            .iter()
            .position(|t| *t == doc_type)
        {
            // Earlier in the priority list, bigger boost.
            Some(position) => 0.5 / (position as f64 + 1.0),
            None => 0.0,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '.')
        .filter(|t| t.len() > 1)
        .map(|t| t.trim_matches('.').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[async_trait]
impl EvidenceRetriever for InMemoryRetriever {
    async fn retrieve(
        &self,
        request: &RetrievalRequest,
    ) -> Result<Vec<EvidenceSnippet>, RetrieverError> {
        if request.top_k == 0 {
            return Err(RetrieverError::InvalidRequest("top_k must be > 0".into()));
        }

        let mut snippets: Vec<EvidenceSnippet> = Vec::new();

        for doc in &self.documents {
            if !doc.status.is_ready() {
                continue;
            }
            if let Some(allowed) = &request.allowed_doc_ids {
                if !allowed.contains(&doc.id) {
                    continue;
                }
            }

            for chunk in &doc.chunks {
                let lexical = Self::score_chunk(request, &chunk.text);
                if lexical <= 0.0 {
                    continue;
                }
                let score = lexical + Self::type_boost(request, doc.doc_type);
                snippets.push(EvidenceSnippet {
                    doc_id: doc.id.clone(),
                    doc_type: doc.doc_type,
                    filename: doc.filename.clone(),
                    chunk_id: chunk.id.clone(),
                    page: chunk.page,
                    text: chunk.text.clone(),
                    score,
                    extraction_confidence: self.doc_confidence(&doc.id),
                });
            }
        }

        // Descending score; chunk id tiebreak keeps ordering stable.
        snippets.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        snippets.truncate(request.top_k);

        Ok(snippets)
    }
}
