//! Audit orchestrator.
//!
//! Runs the deterministic passes, fans grounding checks out across
//! evidence-required fields under a concurrency bound, routes contested
//! outcomes through escalation, and aggregates everything into one
//! report.
//!
//! Degradation is asymmetric by design: if the grounding judge is
//! unavailable the audit still completes with an
//! `EVIDENCE_CHECK_UNAVAILABLE` warning, but the whole-audit deadline
//! is a hard failure. A report produced from half the checks would
//! understate risk.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;

use groundcheck_core::{
    consistency, escalation as escalation_policy, validator, values, AuditPolicy, AuditReport,
    EvidenceSnippet, FieldMeta, FieldSpec, Flag, FlagCode, FormSchema, FormState,
    GroundingOutcome, GroundingVerdict, ReconciliationSuggestion, ReportBuilder,
};

use crate::cache::{GroundingCache, GroundingCacheKey};
use crate::config::RuntimeConfig;
use crate::escalation::{EscalationJudge, EscalationRequest};
use crate::judge::{GroundingJudge, JudgeRequest};
use crate::resilience::{CircuitBreaker, ServiceKind};
use crate::retriever::{EvidenceRetriever, RetrievalRequest};

/// Errors from a full audit run.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Audit timed out after {0:?}")]
    Timeout(Duration),
}

/// Inputs to one audit run.
#[derive(Debug, Clone, Default)]
pub struct AuditRequest {
    pub form: FormState,

    /// Ids of documents that finished ingestion. Drives the
    /// no-ready-docs risk penalty and the grounding cache key.
    pub ready_doc_ids: Vec<String>,

    /// Citations carried over from earlier accepted suggestions, keyed
    /// by field id. Treated as evidence to re-verify, never as a
    /// pre-approved verdict.
    pub field_meta: HashMap<String, FieldMeta>,
}

/// Orchestrates one audit: deterministic checks, grounding fan-out,
/// escalation, aggregation.
pub struct AuditOrchestrator {
    schema: FormSchema,
    policy: AuditPolicy,
    config: RuntimeConfig,
    retriever: Arc<dyn EvidenceRetriever>,
    grounding_judge: Option<Arc<dyn GroundingJudge>>,
    escalation_judge: Option<Arc<dyn EscalationJudge>>,
    cache: GroundingCache,
    circuit_breaker: CircuitBreaker,
}

/// Result of grounding a single field.
struct FieldResult {
    grounded: bool,
    flags: Vec<Flag>,
}

impl FieldResult {
    /// The check could not run for this field. The audit completes and
    /// the report says which field went unchecked.
    fn degraded(field: &FieldSpec) -> Self {
        Self {
            grounded: false,
            flags: vec![Flag::new(
                FlagCode::EvidenceCheckUnavailable,
                &field.id,
                format!(
                    "Document verification is temporarily unavailable; {} was not checked \
                     against your uploads.",
                    field.label.to_lowercase()
                ),
                "Re-run the audit before submitting.",
            )],
        }
    }
}

impl AuditOrchestrator {
    pub fn new(
        schema: FormSchema,
        policy: AuditPolicy,
        config: RuntimeConfig,
        retriever: Arc<dyn EvidenceRetriever>,
    ) -> Self {
        let cache = GroundingCache::new(&config.cache);
        let circuit_breaker = CircuitBreaker::new(config.circuit_breaker.clone());
        Self {
            schema,
            policy,
            config,
            retriever,
            grounding_judge: None,
            escalation_judge: None,
            cache,
            circuit_breaker,
        }
    }

    pub fn with_grounding_judge(mut self, judge: Arc<dyn GroundingJudge>) -> Self {
        self.grounding_judge = Some(judge);
        self
    }

    pub fn with_escalation_judge(mut self, judge: Arc<dyn EscalationJudge>) -> Self {
        self.escalation_judge = Some(judge);
        self
    }

    /// Run a full audit. Fails outright on deadline; every other
    /// problem degrades into flags.
    pub async fn run_audit(&self, request: &AuditRequest) -> Result<AuditReport, AuditError> {
        let deadline = self.config.audit_timeout;
        let started = std::time::Instant::now();
        let report = tokio::time::timeout(deadline, self.audit_inner(request))
            .await
            .map_err(|_| AuditError::Timeout(deadline))?;
        let elapsed = started.elapsed();
        let elapsed = Duration::new(elapsed.as_secs(), elapsed.subsec_millis() * 1_000_000);
        tracing::info!(
            elapsed = %humantime::format_duration(elapsed),
            flags = report.flags.len(),
            risk = report.risk,
            "Audit complete"
        );
        Ok(report)
    }

    async fn audit_inner(&self, request: &AuditRequest) -> AuditReport {
        let mut builder = ReportBuilder::new(&self.schema, &self.policy.risk);
        builder.set_ready_docs(!request.ready_doc_ids.is_empty());

        // Deterministic passes first; they never touch the network.
        builder.extend(validator::validate(&self.schema, &request.form));

        let pay_amounts = self.observed_pay_amounts(request).await;
        builder.extend(consistency::check(&request.form, &pay_amounts, &self.policy));

        // Grounding fan-out, bounded by the concurrency limit.
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_checks.max(1)));
        let evidence_fields: Vec<&FieldSpec> = self.schema.evidence_required_fields().collect();
        let results = join_all(evidence_fields.iter().map(|field| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // Semaphore only closes on explicit close; treat failure
                // as a degraded check rather than panicking.
                let _permit = semaphore.acquire().await;
                self.ground_field(field, request).await
            }
        }))
        .await;

        for result in results {
            builder.record_evidence_field(result.grounded);
            builder.extend(result.flags);
        }

        builder.build()
    }

    /// Per-period pay figures pulled from paystub evidence, feeding the
    /// income variance check.
    async fn observed_pay_amounts(&self, request: &AuditRequest) -> Vec<f64> {
        if request.ready_doc_ids.is_empty() {
            return Vec::new();
        }
        let retrieval = RetrievalRequest {
            field_id: consistency::FIELD_GROSS_PAY.to_string(),
            query: "Gross pay this period".to_string(),
            claimed_value: request.form.value(consistency::FIELD_GROSS_PAY).map(String::from),
            doc_type_priority: vec![groundcheck_core::DocType::Paystub],
            allowed_doc_ids: Some(request.ready_doc_ids.clone()),
            top_k: 6,
        };
        match self.retriever.retrieve(&retrieval).await {
            Ok(snippets) => snippets
                .iter()
                .filter(|s| s.doc_type == groundcheck_core::DocType::Paystub)
                .filter_map(|s| values::extract_money_amounts(&s.text).into_iter().next())
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Paystub retrieval failed, skipping variance check");
                Vec::new()
            }
        }
    }

    async fn ground_field(&self, field: &FieldSpec, request: &AuditRequest) -> FieldResult {
        let Some(claimed) = request.form.value(&field.id) else {
            // Nothing to ground; required-ness is the validator's call.
            return FieldResult {
                grounded: false,
                flags: Vec::new(),
            };
        };

        let cache_key = GroundingCacheKey::new(&field.id, claimed, &request.ready_doc_ids);
        if let Some(outcome) = self.cache.get(&cache_key).await {
            tracing::debug!(field = %field.id, "Grounding cache hit");
            return self.outcome_to_result(field, claimed, outcome, &[], request).await;
        }

        let snippets = match self.gather_snippets(field, claimed, request).await {
            Ok(snippets) => snippets,
            Err(()) => return FieldResult::degraded(field),
        };

        if snippets.is_empty() {
            // No usable evidence at all: an unsupported outcome without
            // consulting the judge.
            let outcome = GroundingOutcome::no_evidence(&field.id);
            self.cache.insert(cache_key, outcome.clone()).await;
            return self.outcome_to_result(field, claimed, outcome, &snippets, request).await;
        }

        let Some(judge) = &self.grounding_judge else {
            return FieldResult::degraded(field);
        };
        if self.circuit_breaker.is_open(ServiceKind::Grounding) {
            tracing::warn!(field = %field.id, "Grounding circuit open, degrading");
            return FieldResult::degraded(field);
        }

        let judge_request = JudgeRequest {
            field_id: field.id.clone(),
            field_label: field.label.clone(),
            claimed_value: claimed.to_string(),
            snippets: snippets.clone(),
        };

        let outcome =
            match tokio::time::timeout(self.config.check_timeout, judge.ground(&judge_request))
                .await
            {
                Ok(Ok(outcome)) => {
                    self.circuit_breaker.record_success(ServiceKind::Grounding);
                    self.cache.insert(cache_key, outcome.clone()).await;
                    outcome
                }
                Ok(Err(e)) => {
                    tracing::warn!(field = %field.id, error = %e, "Grounding check failed");
                    self.circuit_breaker.record_failure(ServiceKind::Grounding);
                    return FieldResult::degraded(field);
                }
                Err(_) => {
                    tracing::warn!(field = %field.id, "Grounding check timed out");
                    self.circuit_breaker.record_failure(ServiceKind::Grounding);
                    return FieldResult::degraded(field);
                }
            };

        self.outcome_to_result(field, claimed, outcome, &snippets, request).await
    }

    /// Retrieval for one field. Accepted-suggestion citations stand in
    /// for retrieval when present; their quotes still go through the
    /// judge like any other snippet.
    async fn gather_snippets(
        &self,
        field: &FieldSpec,
        claimed: &str,
        request: &AuditRequest,
    ) -> Result<Vec<EvidenceSnippet>, ()> {
        if let Some(meta) = request.field_meta.get(&field.id) {
            if !meta.citations.is_empty() {
                return Ok(meta
                    .citations
                    .iter()
                    .map(|c| EvidenceSnippet {
                        doc_id: c.doc_id.clone(),
                        doc_type: c.doc_type,
                        filename: c.doc_id.clone(),
                        chunk_id: c.chunk_id.clone(),
                        page: c.page,
                        text: c.quote.clone(),
                        score: 1.0,
                        extraction_confidence: 1.0,
                    })
                    .collect());
            }
        }

        let retrieval = RetrievalRequest {
            field_id: field.id.clone(),
            query: field.label.clone(),
            claimed_value: Some(claimed.to_string()),
            doc_type_priority: field.candidate_doc_types.clone(),
            allowed_doc_ids: Some(request.ready_doc_ids.clone()),
            top_k: 5,
        };
        self.retriever.retrieve(&retrieval).await.map_err(|e| {
            tracing::warn!(field = %field.id, error = %e, "Evidence retrieval failed");
        })
    }

    /// Map a grounding outcome to flags, routing contested outcomes
    /// through escalation.
    async fn outcome_to_result(
        &self,
        field: &FieldSpec,
        claimed: &str,
        outcome: GroundingOutcome,
        snippets: &[EvidenceSnippet],
        request: &AuditRequest,
    ) -> FieldResult {
        let mut flag = match outcome.verdict {
            GroundingVerdict::Supported => {
                // Documents can corroborate the claim and still
                // disagree with each other.
                let distinct = values::distinct_values(&outcome.candidate_values);
                let flags = if distinct.len() >= 2 {
                    vec![self.multiple_values_flag(field, &distinct, &outcome)]
                } else {
                    Vec::new()
                };
                return FieldResult {
                    grounded: true,
                    flags,
                };
            }
            GroundingVerdict::Unsupported => Flag::new(
                FlagCode::MissingEvidenceRequired,
                &field.id,
                format!("No uploaded document supports {}.", field.label.to_lowercase()),
                "Upload a document that states this value, or correct the field.",
            ),
            GroundingVerdict::Contradicted => self.contradiction_flag(field, claimed, &outcome),
        };

        // Contested outcomes may earn reconciliation guidance; the flag
        // itself never changes.
        if let Some(trigger) =
            escalation_policy::evaluate(&outcome, field, &self.policy.escalation)
        {
            tracing::debug!(field = %field.id, trigger = ?trigger, "Escalating outcome");
            if let Some(suggestion) = self.try_reconcile(field, claimed, &outcome, snippets, request).await
            {
                flag.fix = format!(
                    "{} Evidence favors '{}'. {}",
                    flag.fix, suggestion.preferred_value, suggestion.clarifying_question
                );
                if flag.citations.is_empty() {
                    flag.citations = suggestion.citations;
                }
            }
        }

        FieldResult {
            grounded: false,
            flags: vec![flag],
        }
    }

    /// Ambiguity between sources: the documents assert more than one
    /// value for the field.
    fn multiple_values_flag(
        &self,
        field: &FieldSpec,
        distinct: &[String],
        outcome: &GroundingOutcome,
    ) -> Flag {
        Flag::new(
            FlagCode::MultipleValuesFound,
            &field.id,
            format!(
                "Your documents state different values for {}: {}.",
                field.label.to_lowercase(),
                distinct.join(", ")
            ),
            "Check which document is current and update or annotate the field.",
        )
        .with_citations(
            outcome
                .supporting
                .iter()
                .chain(outcome.contradicting.iter())
                .cloned()
                .collect(),
        )
    }

    /// A contradiction where the documents also corroborate the claimed
    /// value is ambiguity between sources, not a hard conflict.
    fn contradiction_flag(&self, field: &FieldSpec, claimed: &str, outcome: &GroundingOutcome) -> Flag {
        let distinct = values::distinct_values(&outcome.candidate_values);
        let claimed_corroborated = distinct
            .iter()
            .any(|candidate| !values::materially_differ(candidate, claimed));

        if claimed_corroborated && distinct.len() >= 2 {
            self.multiple_values_flag(field, &distinct, outcome)
        } else {
            Flag::new(
                FlagCode::ContradictsDocument,
                &field.id,
                format!(
                    "{} on the form ('{}') conflicts with your documents.",
                    field.label, claimed
                ),
                "Correct the field or upload the document that matches it.",
            )
            .with_citations(outcome.contradicting.clone())
        }
    }

    async fn try_reconcile(
        &self,
        field: &FieldSpec,
        claimed: &str,
        outcome: &GroundingOutcome,
        snippets: &[EvidenceSnippet],
        _request: &AuditRequest,
    ) -> Option<ReconciliationSuggestion> {
        let judge = self.escalation_judge.as_ref()?;
        if self.circuit_breaker.is_open(ServiceKind::Escalation) {
            return None;
        }

        let escalation_request = EscalationRequest {
            field_id: field.id.clone(),
            field_label: field.label.clone(),
            claimed_value: Some(claimed.to_string()),
            outcome: outcome.clone(),
            snippets: snippets.to_vec(),
        };

        match tokio::time::timeout(
            self.config.check_timeout,
            judge.reconcile(&escalation_request),
        )
        .await
        {
            Ok(Ok(suggestion)) => {
                self.circuit_breaker.record_success(ServiceKind::Escalation);
                Some(suggestion)
            }
            Ok(Err(e)) => {
                tracing::warn!(field = %field.id, error = %e, "Escalation failed, keeping original flag");
                self.circuit_breaker.record_failure(ServiceKind::Escalation);
                None
            }
            Err(_) => {
                tracing::warn!(field = %field.id, "Escalation timed out, keeping original flag");
                self.circuit_breaker.record_failure(ServiceKind::Escalation);
                None
            }
        }
    }
}
