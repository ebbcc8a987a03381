use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rmos::feasibility::{RULE_REGISTRY_ENTRIES, rule_by_id};
use rmos::{
    ArtifactStore, FeasibilityEngine, FileArtifactStore, GateRequest, GatedPipeline,
    MemoryArtifactStore, PlanDocumentGenerator, RmosConfig, RunContext, RunOutcome,
    SafetyPolicy, ScenarioCorpus, ValidationHarness, explain_decision,
};

/// RMOS: feasibility rules and safety gate for CNC toolpath requests
#[derive(Parser, Debug)]
#[command(name = "rmos")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a request and apply the safety gate
    Evaluate {
        /// JSON request body
        #[arg(short, long)]
        input: PathBuf,

        /// Tool id recorded on the artifact
        #[arg(long, default_value = "cli")]
        tool_id: String,

        /// Workflow mode recorded on the artifact
        #[arg(long, default_value = "router")]
        mode: String,

        /// Persist the run artifact to the configured runs directory
        #[arg(long)]
        persist: bool,
    },

    /// Explain a stored artifact or decision payload
    Explain {
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Replay scenario corpora and enforce the release gate
    Validate {
        /// Glob pattern for corpus files
        #[arg(short, long, default_value = "scenarios/*.yaml")]
        scenarios: String,
    },

    /// List every registered rule
    Rules,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = RmosConfig::load_or_default(cli.config.as_deref())?;
    config.apply_env_overrides();

    let engine = FeasibilityEngine::from_config(&config.feasibility);
    let policy = SafetyPolicy::from_config(&config.safety);
    info!(
        "Safety policy: block_on_red={}, treat_unknown_as_red={}",
        policy.block_on_red(),
        policy.treat_unknown_as_red()
    );

    match cli.command {
        Command::Evaluate {
            input,
            tool_id,
            mode,
            persist,
        } => {
            let context = RunContext::new(tool_id, mode, "evaluate");
            let request = GateRequest::from_body(context, read_json(&input)?);
            // Without --persist the run is still recorded, in memory only
            let outcome = if persist {
                let store = FileArtifactStore::new(&config.artifacts);
                let pipeline = GatedPipeline::new(engine, policy, store, PlanDocumentGenerator);
                evaluate(pipeline, request).await?
            } else {
                let store = MemoryArtifactStore::new();
                let pipeline = GatedPipeline::new(engine, policy, store, PlanDocumentGenerator);
                evaluate(pipeline, request).await?
            };
            print_json(&evaluation_report(&outcome, persist))?;
            Ok(ExitCode::from(outcome.exit_code()))
        }
        Command::Explain { artifact } => {
            handle_explain(&artifact)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { scenarios } => handle_validate(engine, policy, &scenarios),
        Command::Rules => {
            handle_rules()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON from {:?}", path))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn evaluate<S: ArtifactStore>(
    pipeline: GatedPipeline<S, PlanDocumentGenerator>,
    request: GateRequest,
) -> Result<RunOutcome> {
    let outcome = pipeline
        .run(request)
        .await
        .context("Failed to record run artifact")?;
    info!(
        "Run {} recorded as {:?}",
        outcome.artifact().run_id,
        outcome.artifact().status
    );
    Ok(outcome)
}

fn evaluation_report(outcome: &RunOutcome, persisted: bool) -> Value {
    let artifact = outcome.artifact();
    let (feasibility, block_reason, errors) = match outcome {
        RunOutcome::Completed { feasibility, .. } => (Some(feasibility), None, None),
        RunOutcome::Blocked {
            feasibility,
            blocked,
            ..
        } => (Some(feasibility), Some(&blocked.reason), None),
        RunOutcome::Failed {
            feasibility,
            errors,
            ..
        } => (feasibility.as_ref(), None, Some(errors)),
    };
    json!({
        "run_id": artifact.run_id,
        "status": artifact.status,
        "persisted": persisted,
        "export_allowed": matches!(outcome, RunOutcome::Completed { .. }),
        "block_reason": block_reason,
        "decision": artifact.decision,
        "output_hash": artifact.gcode_hash,
        "errors": errors,
        "feasibility": feasibility,
    })
}

fn handle_explain(path: &Path) -> Result<()> {
    let payload = read_json(path)?;
    print_json(&explain_decision(&payload))
}

fn handle_validate(
    engine: FeasibilityEngine,
    policy: SafetyPolicy,
    pattern: &str,
) -> Result<ExitCode> {
    let corpus = ScenarioCorpus::from_glob(pattern)?;
    let report = ValidationHarness::new(engine, policy).run(&corpus);
    print_json(&report)?;

    if let Err(e) = report.release_gate() {
        eprintln!("\nRelease gate FAILED: {}", e);
        for outcome in report.failures() {
            eprintln!(
                "  - {}: got {} (export_allowed={})",
                outcome.id, outcome.actual_decision, outcome.export_allowed
            );
        }
        return Ok(ExitCode::FAILURE);
    }

    eprintln!(
        "\nRelease gate passed: {}/{} scenario(s)",
        report.passed, report.total
    );
    Ok(ExitCode::SUCCESS)
}

fn handle_rules() -> Result<()> {
    let rules: Vec<_> = RULE_REGISTRY_ENTRIES
        .iter()
        .map(|(id, meta)| {
            json!({
                "rule_id": id,
                "name": rule_by_id(id).map(|rule| rule.name),
                "metadata": meta,
            })
        })
        .collect();
    print_json(&rules)
}
