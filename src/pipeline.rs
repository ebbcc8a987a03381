//! Gated request pipeline.
//!
//! Drives one request through evaluation, the safety gate, artifact
//! persistence and (only with an `ExportPermit`) toolpath generation. Every
//! attempt produces exactly one persisted artifact before an outcome is
//! returned; if persistence fails the caller gets an error, never an allow.

use serde_json::Value;
use tracing::{info, warn};

use crate::artifacts::{ArtifactError, ArtifactStore, RunArtifact, RunContext, RunStatus};
use crate::feasibility::FeasibilityEngine;
use crate::models::{FeasibilityInput, FeasibilityResult, canonical_hash, sha256_hex};
use crate::safety::{BlockedDecision, ExportPermit, GateDecision, SafetyDecision, SafetyPolicy};

/// Produces machine output for a request that passed the gate
pub trait ToolpathGenerator: Send + Sync {
    fn generate(&self, permit: &ExportPermit, input: &FeasibilityInput) -> anyhow::Result<String>;
}

/// Emits the approved request as a JSON plan document instead of machine
/// code, for callers with no CAM backend attached (the CLI).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanDocumentGenerator;

impl ToolpathGenerator for PlanDocumentGenerator {
    fn generate(&self, permit: &ExportPermit, input: &FeasibilityInput) -> anyhow::Result<String> {
        let plan = serde_json::json!({
            "risk_level": permit.risk_level(),
            "warnings": permit.decision().warnings,
            "request": input,
        });
        Ok(serde_json::to_string_pretty(&plan)?)
    }
}

/// One untrusted request as received from the transport layer
#[derive(Debug, Clone)]
pub struct GateRequest {
    pub context: RunContext,
    /// Request body to translate into a `FeasibilityInput`
    pub body: Value,
    /// Feasibility the client claimed; never trusted
    pub client_feasibility: Option<Value>,
}

impl GateRequest {
    /// Split a client body into machining parameters and any feasibility the
    /// client attached.
    pub fn from_body(context: RunContext, mut body: Value) -> Self {
        let client_feasibility = body
            .as_object_mut()
            .and_then(|map| map.remove("feasibility"));
        Self {
            context,
            body,
            client_feasibility,
        }
    }
}

/// What happened to a request
#[derive(Debug)]
pub enum RunOutcome {
    /// Allowed, generated and recorded as OK
    Completed {
        artifact: RunArtifact,
        feasibility: FeasibilityResult,
        gcode: String,
    },
    /// Refused by the gate and recorded as BLOCKED
    Blocked {
        artifact: RunArtifact,
        feasibility: FeasibilityResult,
        blocked: BlockedDecision,
    },
    /// Input or generation failed and was recorded as ERROR
    Failed {
        artifact: RunArtifact,
        feasibility: Option<FeasibilityResult>,
        errors: Vec<String>,
    },
}

impl RunOutcome {
    pub fn artifact(&self) -> &RunArtifact {
        match self {
            RunOutcome::Completed { artifact, .. }
            | RunOutcome::Blocked { artifact, .. }
            | RunOutcome::Failed { artifact, .. } => artifact,
        }
    }

    /// HTTP-equivalent status for the transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            RunOutcome::Completed { .. } => 200,
            RunOutcome::Blocked { .. } => 409,
            RunOutcome::Failed { .. } => 500,
        }
    }

    /// Process exit code for command-line callers
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed { .. } => 0,
            RunOutcome::Failed { .. } => 1,
            RunOutcome::Blocked { .. } => 2,
        }
    }
}

/// Engine, policy, store and generator wired together explicitly
pub struct GatedPipeline<S, G>
where
    S: ArtifactStore,
    G: ToolpathGenerator,
{
    engine: FeasibilityEngine,
    policy: SafetyPolicy,
    store: S,
    generator: G,
}

impl<S, G> GatedPipeline<S, G>
where
    S: ArtifactStore,
    G: ToolpathGenerator,
{
    pub fn new(engine: FeasibilityEngine, policy: SafetyPolicy, store: S, generator: G) -> Self {
        Self {
            engine,
            policy,
            store,
            generator,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run a request end to end.
    ///
    /// Errors only when the artifact could not be persisted.
    pub async fn run(&self, request: GateRequest) -> Result<RunOutcome, ArtifactError> {
        if request.client_feasibility.is_some() {
            warn!(
                "Ignoring client-supplied feasibility for {}; recomputing server-side",
                request.context.tool_id
            );
        }

        let input = match FeasibilityInput::from_json(&request.body) {
            Ok(input) => input,
            Err(e) => {
                let message = e.to_string();
                warn!("Rejected request for {}: {}", request.context.tool_id, message);
                let artifact = RunArtifact::new(
                    RunStatus::Error,
                    &request.context,
                    canonical_hash(&request.body),
                    serde_json::json!({ "risk_level": "ERROR", "rules_triggered": [] }),
                )
                .with_decision(SafetyDecision::error(message.clone()))
                .with_errors(vec![message.clone()]);
                self.store.persist(&artifact).await?;
                return Ok(RunOutcome::Failed {
                    artifact,
                    feasibility: None,
                    errors: vec![message],
                });
            }
        };

        self.run_input(&request.context, &input).await
    }

    /// Run an already-constructed input
    pub async fn run_input(
        &self,
        context: &RunContext,
        input: &FeasibilityInput,
    ) -> Result<RunOutcome, ArtifactError> {
        let feasibility = self.engine.compute(input);
        let feasibility_json = serde_json::to_value(&feasibility)?;
        let request_hash = input.request_hash();

        info!(
            "Feasibility for {}: {} ({} rule(s))",
            context.tool_id,
            feasibility.risk_level,
            feasibility.rules_triggered.len()
        );

        let permit = match self.policy.gate_result(&feasibility) {
            GateDecision::Allowed(permit) => permit,
            GateDecision::Blocked(blocked) => {
                // Persist before refusing so the block is never lost
                let artifact = RunArtifact::new(
                    RunStatus::Blocked,
                    context,
                    request_hash,
                    feasibility_json,
                )
                .with_decision(blocked.decision.clone());
                self.store.persist(&artifact).await?;
                return Ok(RunOutcome::Blocked {
                    artifact,
                    feasibility,
                    blocked,
                });
            }
        };

        match self.generator.generate(&permit, input) {
            Ok(gcode) => {
                let artifact =
                    RunArtifact::new(RunStatus::Ok, context, request_hash, feasibility_json)
                        .with_decision(permit.decision().clone())
                        .with_gcode_hash(sha256_hex(gcode.as_bytes()));
                self.store.persist(&artifact).await?;
                Ok(RunOutcome::Completed {
                    artifact,
                    feasibility,
                    gcode,
                })
            }
            Err(e) => {
                let errors = vec![format!("{:#}", e)];
                warn!("Toolpath generation failed for {}: {:#}", context.tool_id, e);
                let artifact =
                    RunArtifact::new(RunStatus::Error, context, request_hash, feasibility_json)
                        .with_decision(permit.decision().clone())
                        .with_errors(errors.clone());
                self.store.persist(&artifact).await?;
                Ok(RunOutcome::Failed {
                    artifact,
                    feasibility: Some(feasibility),
                    errors,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::MemoryArtifactStore;
    use crate::config::SafetyConfig;
    use crate::models::RiskLevel;
    use serde_json::json;

    struct StubGenerator;

    impl ToolpathGenerator for StubGenerator {
        fn generate(
            &self,
            permit: &ExportPermit,
            input: &FeasibilityInput,
        ) -> anyhow::Result<String> {
            Ok(format!(
                "(risk {})\nG21\nG0 Z{}\nM30\n",
                permit.risk_level(),
                input.safe_z
            ))
        }
    }

    struct BrokenGenerator;

    impl ToolpathGenerator for BrokenGenerator {
        fn generate(&self, _: &ExportPermit, _: &FeasibilityInput) -> anyhow::Result<String> {
            anyhow::bail!("offset failed: self-intersecting loop")
        }
    }

    fn pipeline<G: ToolpathGenerator>(generator: G) -> GatedPipeline<MemoryArtifactStore, G> {
        GatedPipeline::new(
            FeasibilityEngine::new(),
            SafetyPolicy::default(),
            MemoryArtifactStore::new(),
            generator,
        )
    }

    fn context() -> RunContext {
        RunContext::new("rosette_cam", "router", "toolpath")
    }

    fn body() -> Value {
        json!({
            "tool_d": 6.0,
            "stepover": 0.45,
            "stepdown": 1.5,
            "z_rough": -3.0,
            "feed_xy": 1200.0,
            "feed_z": 300.0,
            "safe_z": 5.0,
            "has_closed_paths": true
        })
    }

    #[tokio::test]
    async fn test_green_request_completes() {
        let pipeline = pipeline(StubGenerator);
        let outcome = pipeline
            .run(GateRequest::from_body(context(), body()))
            .await
            .unwrap();

        let RunOutcome::Completed { artifact, gcode, .. } = &outcome else {
            panic!("expected completion, got {:?}", outcome);
        };
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(artifact.status, RunStatus::Ok);
        assert_eq!(artifact.gcode_hash.as_deref(), Some(sha256_hex(gcode.as_bytes()).as_str()));
        assert_eq!(pipeline.store().len(), 1);
    }

    #[tokio::test]
    async fn test_red_request_blocked_and_persisted() {
        let pipeline = pipeline(StubGenerator);
        let mut body = body();
        body["tool_d"] = json!(0.0);

        let outcome = pipeline
            .run(GateRequest::from_body(context(), body))
            .await
            .unwrap();
        let RunOutcome::Blocked { artifact, blocked, feasibility } = &outcome else {
            panic!("expected block, got {:?}", outcome);
        };
        assert_eq!(outcome.status_code(), 409);
        assert_eq!(artifact.status, RunStatus::Blocked);
        assert!(artifact.gcode_hash.is_none());
        assert_eq!(blocked.decision.risk_level, RiskLevel::Red);
        assert_eq!(feasibility.rules_triggered, vec!["F001"]);

        let stored = pipeline.store().load(&artifact.run_id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Blocked);
        assert_eq!(stored.explain().triggered_rules[0].rule_id, "F001");
    }

    #[tokio::test]
    async fn test_client_feasibility_is_ignored() {
        let pipeline = pipeline(StubGenerator);
        let mut body = body();
        body["safe_z"] = json!(-1.0);
        body["feasibility"] = json!({"risk_level": "GREEN", "blocking": false});

        let request = GateRequest::from_body(context(), body);
        assert!(request.client_feasibility.is_some());
        let outcome = pipeline.run(request).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_malformed_body_records_error() {
        let pipeline = pipeline(StubGenerator);
        let outcome = pipeline
            .run(GateRequest::from_body(context(), json!({"tool_d": "wide"})))
            .await
            .unwrap();
        let RunOutcome::Failed { artifact, feasibility, errors } = &outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(outcome.status_code(), 500);
        assert_eq!(artifact.status, RunStatus::Error);
        assert!(feasibility.is_none());
        assert!(!errors.is_empty());
        assert_eq!(
            artifact.decision.as_ref().unwrap().risk_level,
            RiskLevel::Error
        );
    }

    #[tokio::test]
    async fn test_generator_failure_records_error() {
        let pipeline = pipeline(BrokenGenerator);
        let outcome = pipeline
            .run(GateRequest::from_body(context(), body()))
            .await
            .unwrap();
        let RunOutcome::Failed { artifact, errors, .. } = &outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(artifact.status, RunStatus::Error);
        assert!(errors[0].contains("self-intersecting"));
        assert!(artifact.gcode_hash.is_none());
    }

    #[tokio::test]
    async fn test_policy_override_allows_red() {
        let pipeline = GatedPipeline::new(
            FeasibilityEngine::new(),
            SafetyPolicy::from_config(&SafetyConfig {
                block_on_red: false,
                treat_unknown_as_red: true,
            }),
            MemoryArtifactStore::new(),
            StubGenerator,
        );
        let mut body = body();
        body["stepover"] = json!(1.5);
        let outcome = pipeline
            .run(GateRequest::from_body(context(), body))
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_plan_document_carries_approved_request() {
        let pipeline = pipeline(PlanDocumentGenerator);
        let mut body = body();
        body["smallest_feature_mm"] = json!(3.0);
        let outcome = pipeline
            .run(GateRequest::from_body(context(), body))
            .await
            .unwrap();

        let RunOutcome::Completed { gcode, .. } = &outcome else {
            panic!("expected completion, got {:?}", outcome);
        };
        assert_eq!(outcome.exit_code(), 0);
        let plan: serde_json::Value = serde_json::from_str(gcode).unwrap();
        assert_eq!(plan["risk_level"], "YELLOW");
        assert_eq!(plan["request"]["tool_d"], 6.0);
        assert_eq!(plan["warnings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exit_codes_follow_outcome() {
        let pipeline = pipeline(PlanDocumentGenerator);
        let mut red = body();
        red["tool_d"] = json!(0.0);
        let blocked = pipeline
            .run(GateRequest::from_body(context(), red))
            .await
            .unwrap();
        assert_eq!(blocked.exit_code(), 2);

        let failed = pipeline
            .run(GateRequest::from_body(context(), json!([])))
            .await
            .unwrap();
        assert_eq!(failed.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_same_input_same_hashes() {
        let pipeline = pipeline(StubGenerator);
        let a = pipeline
            .run(GateRequest::from_body(context(), body()))
            .await
            .unwrap();
        let b = pipeline
            .run(GateRequest::from_body(context(), body()))
            .await
            .unwrap();
        assert_eq!(a.artifact().request_hash, b.artifact().request_hash);
        assert_eq!(a.artifact().gcode_hash, b.artifact().gcode_hash);
        assert_ne!(a.artifact().run_id, b.artifact().run_id);
    }
}
