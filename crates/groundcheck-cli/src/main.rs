//! `groundcheck` binary: run a preview audit from local files.
//!
//! The audit needs three inputs: a form schema (YAML or JSON), the
//! current form state (JSON object of field id to value), and the
//! uploaded document set (JSON array). When `ANTHROPIC_API_KEY` is set
//! the grounding and escalation judges run against the Anthropic API;
//! without it the audit still completes and each unchecked field
//! carries a warning.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use groundcheck_core::{AuditPolicy, AuditReport, Document, FieldMeta, FormSchema, FormState};
use groundcheck_runtime::{
    AuditOrchestrator, AuditRequest, CompletionConfig, InMemoryRetriever, LlmEscalationJudge,
    LlmGroundingJudge, ProviderRegistry, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "groundcheck", version, about = "Audit benefit applications against uploaded evidence")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full audit and print the report.
    Audit(AuditArgs),
    /// Validate a form schema file.
    Schema(SchemaArgs),
}

#[derive(Parser)]
struct AuditArgs {
    /// Form schema file (.yaml/.yml/.json). Defaults to the built-in
    /// housing benefits schema.
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Form state JSON: an object of field id to raw value.
    #[arg(long)]
    form: PathBuf,

    /// Document set JSON: an array of ingested documents with chunks.
    #[arg(long)]
    docs: PathBuf,

    /// Accepted-suggestion metadata JSON, keyed by field id.
    #[arg(long)]
    meta: Option<PathBuf>,

    /// LLM provider type for the grounding and escalation judges.
    #[arg(long, default_value = "anthropic")]
    provider: String,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct SchemaArgs {
    /// Schema file to validate.
    #[arg(long)]
    check: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Audit(args) => run_audit(args).await,
        Commands::Schema(args) => check_schema(&args.check),
    }
}

async fn run_audit(args: AuditArgs) -> Result<ExitCode> {
    let schema = match &args.schema {
        Some(path) => load_schema(path)?,
        None => FormSchema::builtin(),
    };

    let form: FormState = read_json(&args.form).context("reading form state")?;
    let documents: Vec<Document> = read_json(&args.docs).context("reading document set")?;
    let field_meta: HashMap<String, FieldMeta> = match &args.meta {
        Some(path) => read_json(path).context("reading field metadata")?,
        None => HashMap::new(),
    };

    let ready_doc_ids: Vec<String> = documents
        .iter()
        .filter(|d| d.status.is_ready())
        .map(|d| d.id.clone())
        .collect();

    let config = RuntimeConfig::default();
    let retriever = Arc::new(InMemoryRetriever::new(documents));
    let mut orchestrator =
        AuditOrchestrator::new(schema, AuditPolicy::default(), config.clone(), retriever);

    let registry = ProviderRegistry::with_defaults();
    match registry.create(&args.provider, &serde_json::json!({})) {
        Ok(provider) => {
            orchestrator = orchestrator
                .with_grounding_judge(Arc::new(LlmGroundingJudge::new(
                    Arc::clone(&provider),
                    CompletionConfig {
                        model: config.grounding_model.clone(),
                        ..Default::default()
                    },
                )))
                .with_escalation_judge(Arc::new(LlmEscalationJudge::new(
                    provider,
                    CompletionConfig {
                        model: config.escalation_model.clone(),
                        ..Default::default()
                    },
                )));
        }
        Err(e) => {
            tracing::warn!(error = %e, "No LLM provider available; evidence checks will degrade");
        }
    }

    let report = orchestrator
        .run_audit(&AuditRequest {
            form,
            ready_doc_ids,
            field_meta,
        })
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.has_blockers() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn check_schema(path: &Path) -> Result<ExitCode> {
    let schema = load_schema(path)?;
    println!(
        "schema OK: {} (version {}, {} fields)",
        schema.name,
        schema.version,
        schema.fields.len()
    );
    Ok(ExitCode::SUCCESS)
}

fn load_schema(path: &Path) -> Result<FormSchema> {
    let schema = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => FormSchema::from_yaml_file(path),
        _ => FormSchema::from_json_file(path),
    };
    schema.with_context(|| format!("loading schema from {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_report(report: &AuditReport) {
    println!(
        "risk {}/100  coverage {}%  blockers {}  warnings {}  infos {}",
        report.risk, report.coverage_pct, report.blockers, report.warnings, report.infos
    );
    if report.flags.is_empty() {
        println!("no findings");
        return;
    }
    println!();
    for flag in &report.flags {
        println!(
            "[{}] {} {}",
            wire_name(&flag.severity),
            flag.field_id,
            wire_name(&flag.code)
        );
        println!("    {}", flag.message);
        println!("    fix: {}", flag.fix);
        for citation in &flag.citations {
            println!(
                "    cite: {} p.{}: \"{}\"",
                citation.doc_id, citation.page, citation.quote
            );
        }
    }
    let fields: std::collections::BTreeSet<&str> =
        report.flags.iter().map(|f| f.field_id.as_str()).collect();
    println!();
    println!(
        "{} finding(s) across {} field(s)",
        report.flags.len(),
        fields.len()
    );
}

/// Serde wire name of a unit enum variant, e.g. `CONTRADICTS_DOCUMENT`.
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(String::from))
        .unwrap_or_else(|| "UNKNOWN".to_string())
}

