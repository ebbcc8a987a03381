//! Normalization of feasibility payloads into a `SafetyDecision`.
//!
//! Producers put the risk level in different places. Each location is a
//! `PayloadShape`; shapes are tried in `EXTRACTION_ORDER` and the first one
//! carrying a non-empty string `risk_level` wins. Nothing in this module can
//! fail: a payload without a usable level resolves to `UNKNOWN`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_utils::{finite_f64, non_empty_str, object_field, string_list};
use crate::models::{FeasibilityResult, RiskLevel};

/// Reason recorded when no payload location carried a risk level
pub const EXTRACTION_FAILED_REASON: &str =
    "risk_level could not be extracted from feasibility payload";

/// Canonical gate input derived from any feasibility payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyDecision {
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub block_reason: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SafetyDecision {
    /// Decision for a payload that could not be interpreted
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Unknown,
            score: None,
            block_reason: Some(reason.into()),
            warnings: Vec::new(),
        }
    }

    /// Decision for a request the engine could not evaluate
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Error,
            score: None,
            block_reason: Some(reason.into()),
            warnings: Vec::new(),
        }
    }

    /// Typed path for a result computed in-process
    pub fn from_result(result: &FeasibilityResult) -> Self {
        Self {
            risk_level: result.risk_level,
            score: None,
            block_reason: (!result.blocking_reasons.is_empty())
                .then(|| result.blocking_reasons.join("; ")),
            warnings: result.warnings.clone(),
        }
    }
}

/// Location of the risk level inside a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `{"risk_level": ...}`
    Flat,
    /// `{"decision": {"risk_level": ...}}`
    NestedDecision,
    /// `{"safety": {"risk_level": ...}}`
    NestedSafety,
}

impl PayloadShape {
    /// Match order; earlier shapes take priority
    pub const EXTRACTION_ORDER: [PayloadShape; 3] = [
        PayloadShape::Flat,
        PayloadShape::NestedDecision,
        PayloadShape::NestedSafety,
    ];

    /// The object this shape reads from, if the payload has it
    pub fn candidate<'a>(&self, payload: &'a Value) -> Option<&'a Value> {
        match self {
            PayloadShape::Flat => payload.is_object().then_some(payload),
            PayloadShape::NestedDecision => object_field(payload, "decision"),
            PayloadShape::NestedSafety => object_field(payload, "safety"),
        }
    }

    /// Risk level at this shape's location, if a non-empty label is present
    pub fn risk_level(&self, payload: &Value) -> Option<RiskLevel> {
        let candidate = self.candidate(payload)?;
        non_empty_str(candidate, "risk_level").map(RiskLevel::parse_lenient)
    }
}

/// Resolve a payload into a decision. Pass `Value::Null` for "no payload".
pub fn extract_safety_decision(payload: &Value) -> SafetyDecision {
    let resolved = PayloadShape::EXTRACTION_ORDER.iter().find_map(|shape| {
        let candidate = shape.candidate(payload)?;
        let label = non_empty_str(candidate, "risk_level")?;
        Some((candidate, label))
    });

    let Some((candidate, label)) = resolved else {
        return SafetyDecision::unknown(EXTRACTION_FAILED_REASON);
    };

    let risk_level = RiskLevel::parse_lenient(label);
    let block_reason = non_empty_str(candidate, "block_reason")
        .map(str::to_string)
        .or_else(|| {
            let reasons = string_list(candidate, "blocking_reasons");
            (!reasons.is_empty()).then(|| reasons.join("; "))
        })
        .or_else(|| {
            (risk_level == RiskLevel::Unknown && !label.eq_ignore_ascii_case("UNKNOWN"))
                .then(|| format!("unrecognized risk_level {:?}", label))
        });

    SafetyDecision {
        risk_level,
        score: finite_f64(candidate, "score"),
        block_reason,
        warnings: string_list(candidate, "warnings"),
    }
}
