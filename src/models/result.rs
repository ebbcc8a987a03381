use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::hashing::canonical_hash;
use super::input::FeasibilityInput;
use super::risk::{RiskLevel, RuleLevel};

/// One triggered check. Carries no id of its own; the aggregator pairs it
/// with the rule it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    pub level: RuleLevel,
    pub message: String,
    /// Machine-readable bound, e.g. `tool_d <= 3.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl RuleHit {
    pub fn red(message: impl Into<String>) -> Self {
        Self {
            level: RuleLevel::Red,
            message: message.into(),
            constraint: None,
        }
    }

    pub fn yellow(message: impl Into<String>) -> Self {
        Self {
            level: RuleLevel::Yellow,
            message: message.into(),
            constraint: None,
        }
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

/// A hit tagged with the registry id of the rule that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    #[serde(flatten)]
    pub hit: RuleHit,
}

/// Audit echo of the input fields an operator most often asks about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityDetails {
    pub request_hash: String,
    pub pipeline_id: String,
    pub post_id: String,
    pub tool_d: f64,
    pub stepover: f64,
    pub stepdown: f64,
    pub z_rough: f64,
    pub feed_xy: f64,
    pub feed_z: f64,
    pub safe_z: f64,
    pub strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material_id: Option<String>,
}

impl From<&FeasibilityInput> for FeasibilityDetails {
    fn from(input: &FeasibilityInput) -> Self {
        Self {
            request_hash: input.request_hash(),
            pipeline_id: input.pipeline_id.clone(),
            post_id: input.post_id.clone(),
            tool_d: input.tool_d,
            stepover: input.stepover,
            stepdown: input.stepdown,
            z_rough: input.z_rough,
            feed_xy: input.feed_xy,
            feed_z: input.feed_z,
            safe_z: input.safe_z,
            strategy: input.strategy.clone(),
            material_id: input.material_id.clone(),
        }
    }
}

/// Outcome of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityResult {
    /// Worst-of level across all hits
    pub risk_level: RiskLevel,
    /// True iff any RED hit exists
    pub blocking: bool,
    /// RED hit messages, in evaluation order
    pub blocking_reasons: Vec<String>,
    /// YELLOW hit messages, in evaluation order
    pub warnings: Vec<String>,
    /// Rule ids of every hit, in evaluation order
    pub rules_triggered: Vec<String>,
    pub constraints: Vec<String>,
    pub engine_version: String,
    /// Informational only; excluded from `decision_hash`
    pub computed_at: DateTime<Utc>,
    pub details: FeasibilityDetails,
}

#[derive(Serialize)]
struct DecisionFingerprint<'a> {
    risk_level: RiskLevel,
    blocking: bool,
    blocking_reasons: &'a [String],
    warnings: &'a [String],
    rules_triggered: &'a [String],
    constraints: &'a [String],
    engine_version: &'a str,
    request_hash: &'a str,
}

impl FeasibilityResult {
    /// SHA-256 over every deterministic field. Two evaluations of the same
    /// input by the same engine version always agree on this value.
    pub fn decision_hash(&self) -> String {
        canonical_hash(&DecisionFingerprint {
            risk_level: self.risk_level,
            blocking: self.blocking,
            blocking_reasons: &self.blocking_reasons,
            warnings: &self.warnings,
            rules_triggered: &self.rules_triggered,
            constraints: &self.constraints,
            engine_version: &self.engine_version,
            request_hash: &self.details.request_hash,
        })
    }

    /// Constraints that parse into structured bounds
    pub fn parsed_constraints(&self) -> Vec<ParsedConstraint> {
        self.constraints
            .iter()
            .filter_map(|c| ParsedConstraint::parse(c))
            .collect()
    }
}

/// Comparison operator of a machine-readable constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOp {
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    AtLeast,
    #[serde(rename = ">")]
    GreaterThan,
}

/// Structured form of a constraint string such as `stepdown <= 3.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedConstraint {
    pub parameter: String,
    pub op: ConstraintOp,
    pub bound: f64,
}

static CONSTRAINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_()]*)\s*(<=|>=|<|>)\s*(-?\d+(?:\.\d+)?)\s*$")
        .expect("constraint pattern is valid")
});

impl ParsedConstraint {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CONSTRAINT_RE.captures(raw)?;
        let op = match &caps[2] {
            "<=" => ConstraintOp::AtMost,
            "<" => ConstraintOp::LessThan,
            ">=" => ConstraintOp::AtLeast,
            _ => ConstraintOp::GreaterThan,
        };
        let bound = caps[3].parse().ok()?;
        Some(Self {
            parameter: caps[1].to_string(),
            op,
            bound,
        })
    }

    /// Whether a candidate value satisfies the bound
    pub fn admits(&self, value: f64) -> bool {
        match self.op {
            ConstraintOp::AtMost => value <= self.bound,
            ConstraintOp::LessThan => value < self.bound,
            ConstraintOp::AtLeast => value >= self.bound,
            ConstraintOp::GreaterThan => value > self.bound,
        }
    }
}
