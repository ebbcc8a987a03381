pub mod artifacts;
pub mod config;
pub mod critical;
pub mod feasibility;
pub mod harness;
pub mod json_utils;
pub mod models;
pub mod pipeline;
pub mod safety;

// Re-export main types
pub use artifacts::{
    ArtifactError, ArtifactStore, FileArtifactStore, MemoryArtifactStore, RunArtifact, RunContext,
    RunStatus,
};
pub use config::RmosConfig;
pub use critical::{SAFETY_CRITICAL_COMPONENTS, SafetyCritical};
pub use feasibility::{
    DecisionExplanation, ENGINE_VERSION, FeasibilityEngine, compute_feasibility, explain_decision,
    explain_rules,
};
pub use harness::{HarnessError, HarnessReport, ScenarioCorpus, ValidationHarness};
pub use models::{FeasibilityInput, FeasibilityResult, RiskLevel};
pub use pipeline::{
    GateRequest, GatedPipeline, PlanDocumentGenerator, RunOutcome, ToolpathGenerator,
};
pub use safety::{ExportPermit, GateDecision, SafetyDecision, SafetyPolicy, extract_safety_decision};
