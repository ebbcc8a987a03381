//! Scenario-driven validation harness.
//!
//! Replays a corpus of scenarios through the engine and the safety policy and
//! decides whether a release may ship. A scenario tagged `adversarial` that
//! resolves to GREEN or YELLOW is a RED leak and fails the release gate no
//! matter how many other scenarios pass.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{error, info, warn};

use crate::critical::{SAFETY_CRITICAL_COMPONENTS, SafetyCritical};
use crate::feasibility::FeasibilityEngine;
use crate::models::{FeasibilityInput, RiskLevel};
use crate::safety::{SafetyDecision, SafetyPolicy};

/// Tag marking scenarios that must never resolve to GREEN or YELLOW
pub const ADVERSARIAL_TAG: &str = "adversarial";

// ============================================================================
// Corpus
// ============================================================================

/// What a scenario must resolve to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expectation {
    /// Acceptable risk levels
    pub decision: Vec<RiskLevel>,
    /// Whether the gate must allow export
    pub export_allowed: bool,
    /// Rule ids of which at least one should trigger (informational)
    #[serde(default)]
    pub rules: Vec<String>,
}

/// One recorded request and its expected verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Raw request body, translated exactly as the transport layer would
    pub input: Value,
    pub expected: Expectation,
}

impl Scenario {
    pub fn is_adversarial(&self) -> bool {
        self.tags.iter().any(|t| t == ADVERSARIAL_TAG)
    }
}

/// A named set of scenarios
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioCorpus {
    #[serde(default)]
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

impl ScenarioCorpus {
    /// Parse a corpus from YAML (JSON is accepted as a YAML subset)
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse scenario corpus")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario corpus {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("In corpus {:?}", path))
    }

    /// Load every corpus file matching a glob pattern, in path order
    pub fn from_glob(pattern: &str) -> Result<Self> {
        let mut paths: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("Invalid scenario pattern: {}", pattern))?
            .collect::<std::result::Result<_, _>>()
            .context("Failed to read scenario path")?;
        paths.sort();
        if paths.is_empty() {
            anyhow::bail!("No scenario files match {}", pattern);
        }

        let mut corpus = ScenarioCorpus {
            name: pattern.to_string(),
            scenarios: Vec::new(),
        };
        for path in paths {
            corpus.scenarios.extend(Self::from_file(&path)?.scenarios);
        }
        Ok(corpus)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Result of replaying one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub id: String,
    pub adversarial: bool,
    pub actual_decision: RiskLevel,
    pub export_allowed: bool,
    pub rules_triggered: Vec<String>,
    pub decision_ok: bool,
    pub export_ok: bool,
    /// `None` when the scenario names no rules
    pub rules_matched: Option<bool>,
    pub red_leak: bool,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_error: Option<String>,
}

/// Aggregate result of a harness run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessReport {
    pub corpus: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub red_leaks: Vec<String>,
    pub covered_components: Vec<String>,
    pub outcomes: Vec<ScenarioOutcome>,
}

/// Reason a release may not ship
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HarnessError {
    #[error("scenario corpus is empty")]
    EmptyCorpus,
    #[error("RED leak: adversarial scenario(s) resolved to GREEN/YELLOW: {}", .0.join(", "))]
    RedLeak(Vec<String>),
    #[error("safety-critical component {0} was not exercised")]
    Uncovered(String),
    #[error("{failed} of {total} scenario(s) failed")]
    Failures { failed: usize, total: usize },
}

impl HarnessReport {
    /// Release-blocking check: no RED leaks, every safety-critical component
    /// exercised, and a 100% pass rate.
    pub fn release_gate(&self) -> std::result::Result<(), HarnessError> {
        if self.total == 0 {
            return Err(HarnessError::EmptyCorpus);
        }
        if !self.red_leaks.is_empty() {
            return Err(HarnessError::RedLeak(self.red_leaks.clone()));
        }
        for component in SAFETY_CRITICAL_COMPONENTS {
            if !self.covered_components.iter().any(|c| c == component) {
                return Err(HarnessError::Uncovered(component.to_string()));
            }
        }
        if self.failed > 0 {
            return Err(HarnessError::Failures {
                failed: self.failed,
                total: self.total,
            });
        }
        Ok(())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Replays scenarios through an engine and policy
#[derive(Debug, Clone, Default)]
pub struct ValidationHarness {
    engine: FeasibilityEngine,
    policy: SafetyPolicy,
}

impl ValidationHarness {
    pub fn new(engine: FeasibilityEngine, policy: SafetyPolicy) -> Self {
        Self { engine, policy }
    }

    pub fn run(&self, corpus: &ScenarioCorpus) -> HarnessReport {
        let mut covered = BTreeSet::new();
        let outcomes: Vec<_> = corpus
            .scenarios
            .iter()
            .map(|s| self.run_scenario(s, &mut covered))
            .collect();

        let total = outcomes.len();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        let red_leaks: Vec<_> = outcomes
            .iter()
            .filter(|o| o.red_leak)
            .map(|o| o.id.clone())
            .collect();
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };

        for o in outcomes.iter().filter(|o| !o.passed) {
            warn!(
                "Scenario {} failed: got {} (export_allowed={})",
                o.id, o.actual_decision, o.export_allowed
            );
        }
        for id in &red_leaks {
            error!("RED leak in adversarial scenario {}", id);
        }
        info!(
            "Harness: {}/{} passed ({:.1}%), {} RED leak(s)",
            passed,
            total,
            pass_rate * 100.0,
            red_leaks.len()
        );

        HarnessReport {
            corpus: corpus.name.clone(),
            total,
            passed,
            failed: total - passed,
            pass_rate,
            red_leaks,
            covered_components: covered.into_iter().map(str::to_string).collect(),
            outcomes,
        }
    }

    fn run_scenario(
        &self,
        scenario: &Scenario,
        covered: &mut BTreeSet<&'static str>,
    ) -> ScenarioOutcome {
        let (actual_decision, rules_triggered, input_error, decision) =
            match FeasibilityInput::from_json(&scenario.input) {
                Ok(input) => {
                    let result = self.engine.compute(&input);
                    covered.insert(<FeasibilityEngine as SafetyCritical>::COMPONENT);
                    let decision = SafetyDecision::from_result(&result);
                    (result.risk_level, result.rules_triggered, None, decision)
                }
                Err(e) => {
                    let message = e.to_string();
                    let decision = SafetyDecision::error(message.clone());
                    (RiskLevel::Error, Vec::new(), Some(message), decision)
                }
            };

        let export_allowed = self.policy.gate(decision).is_allowed();
        covered.insert(<SafetyPolicy as SafetyCritical>::COMPONENT);

        let expected = &scenario.expected;
        let decision_ok = expected.decision.contains(&actual_decision);
        let export_ok = export_allowed == expected.export_allowed;
        let rules_matched = (!expected.rules.is_empty())
            .then(|| expected.rules.iter().any(|r| rules_triggered.contains(r)));
        let adversarial = scenario.is_adversarial();
        let red_leak =
            adversarial && matches!(actual_decision, RiskLevel::Green | RiskLevel::Yellow);

        ScenarioOutcome {
            id: scenario.id.clone(),
            adversarial,
            actual_decision,
            export_allowed,
            rules_triggered,
            decision_ok,
            export_ok,
            rules_matched,
            red_leak,
            passed: decision_ok && export_ok && !red_leak,
            input_error,
        }
    }
}
