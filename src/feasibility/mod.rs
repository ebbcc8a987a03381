//! Deterministic feasibility evaluation for machining requests.
//!
//! # Module Structure
//!
//! - `rules`: F001-F006 hard-invalid checks, F010-F023 advisory checks
//! - `registry`: static metadata for every rule id
//! - `explain`: registry-only rendering of stored decisions

pub mod explain;
pub mod registry;
pub mod rules;

pub use explain::{DecisionExplanation, ExplainedRule, explain_decision, explain_result, explain_rules};
pub use registry::{RULE_REGISTRY_ENTRIES, RuleMetadata, lookup};
pub use rules::{RULES, RuleDefinition, all_rules, rule_by_id};

use chrono::Utc;
use tracing::debug;

use crate::config::FeasibilityConfig;
use crate::critical::SafetyCritical;
use crate::models::{
    FeasibilityDetails, FeasibilityInput, FeasibilityResult, RiskLevel, RuleLevel,
};

/// Version tag stamped on every result for audit provenance
pub const ENGINE_VERSION: &str = "rmos-feasibility/1.1.0";

// ============================================================================
// Feasibility Engine
// ============================================================================

/// Runs the rule set against an input and aggregates the hits
#[derive(Debug, Clone, Default)]
pub struct FeasibilityEngine {
    limits: FeasibilityConfig,
}

impl SafetyCritical for FeasibilityEngine {
    const COMPONENT: &'static str = "feasibility_engine";
}

impl FeasibilityEngine {
    /// Create an engine with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine from configuration
    pub fn from_config(config: &FeasibilityConfig) -> Self {
        Self { limits: *config }
    }

    pub fn limits(&self) -> &FeasibilityConfig {
        &self.limits
    }

    /// Evaluate every rule and derive the worst-of risk level.
    ///
    /// Never returns `Unknown` or `Error`: those belong to the safety policy
    /// layer, for payloads that could not be evaluated at all.
    ///
    /// Rules and limits are in millimetres, so inch requests are converted
    /// first. The details echo keeps the request as submitted.
    pub fn compute(&self, input: &FeasibilityInput) -> FeasibilityResult {
        let triggered = all_rules(&input.in_millimeters(), &self.limits);

        let mut blocking_reasons = Vec::new();
        let mut warnings = Vec::new();
        let mut rules_triggered = Vec::with_capacity(triggered.len());
        let mut constraints = Vec::new();

        for t in triggered {
            debug!(
                "Rule {} hit ({}): {}",
                t.rule_id,
                t.hit.level.as_str(),
                t.hit.message
            );
            match t.hit.level {
                RuleLevel::Red => blocking_reasons.push(t.hit.message),
                RuleLevel::Yellow => warnings.push(t.hit.message),
            }
            if let Some(constraint) = t.hit.constraint {
                constraints.push(constraint);
            }
            rules_triggered.push(t.rule_id);
        }

        let risk_level = if !blocking_reasons.is_empty() {
            RiskLevel::Red
        } else if !warnings.is_empty() {
            RiskLevel::Yellow
        } else {
            RiskLevel::Green
        };

        FeasibilityResult {
            risk_level,
            blocking: risk_level == RiskLevel::Red,
            blocking_reasons,
            warnings,
            rules_triggered,
            constraints,
            engine_version: ENGINE_VERSION.to_string(),
            computed_at: Utc::now(),
            details: FeasibilityDetails::from(input),
        }
    }
}

/// Evaluate an input with the default limits
pub fn compute_feasibility(input: &FeasibilityInput) -> FeasibilityResult {
    FeasibilityEngine::default().compute(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Units;

    fn valid() -> FeasibilityInput {
        FeasibilityInput {
            has_closed_paths: Some(true),
            ..FeasibilityInput::new(6.0, 0.5, 1.0, -1.0, 1200.0, 300.0, 5.0)
        }
    }

    #[test]
    fn test_green_when_nothing_triggers() {
        let result = compute_feasibility(&valid());
        assert_eq!(result.risk_level, RiskLevel::Green);
        assert!(!result.blocking);
        assert!(result.rules_triggered.is_empty());
        assert!(result.blocking_reasons.is_empty());
        assert!(result.warnings.is_empty());
        assert_eq!(result.engine_version, ENGINE_VERSION);
    }

    #[test]
    fn test_zero_tool_diameter_is_red() {
        let input = FeasibilityInput {
            tool_d: 0.0,
            ..valid()
        };
        let result = compute_feasibility(&input);
        assert_eq!(result.risk_level, RiskLevel::Red);
        assert!(result.blocking);
        assert!(
            result
                .blocking_reasons
                .contains(&"tool_d must be > 0".to_string())
        );
        assert!(!result.rules_triggered.is_empty());
    }

    #[test]
    fn test_tool_exceeding_feature_is_yellow_with_constraint() {
        let input = FeasibilityInput {
            smallest_feature_mm: Some(3.0),
            ..valid()
        };
        let result = compute_feasibility(&input);
        assert_eq!(result.risk_level, RiskLevel::Yellow);
        assert!(!result.blocking);
        assert_eq!(result.constraints, vec!["tool_d <= 3.0"]);
        assert_eq!(result.parsed_constraints()[0].bound, 3.0);
    }

    #[test]
    fn test_red_dominates_yellow() {
        let input = FeasibilityInput {
            safe_z: -2.0,
            feed_z: 5000.0,
            ..valid()
        };
        let result = compute_feasibility(&input);
        assert_eq!(result.risk_level, RiskLevel::Red);
        assert_eq!(result.rules_triggered, vec!["F005", "F011"]);
        assert_eq!(result.blocking_reasons.len(), 1);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let input = FeasibilityInput {
            stepdown: 4.0,
            loop_count_hint: Some(2000),
            smallest_feature_mm: Some(2.5),
            ..valid()
        };
        let a = compute_feasibility(&input);
        let b = compute_feasibility(&input);
        assert_eq!(a.risk_level, b.risk_level);
        assert_eq!(a.blocking, b.blocking);
        assert_eq!(a.blocking_reasons, b.blocking_reasons);
        assert_eq!(a.warnings, b.warnings);
        assert_eq!(a.rules_triggered, b.rules_triggered);
        assert_eq!(a.constraints, b.constraints);
        assert_eq!(a.decision_hash(), b.decision_hash());
    }

    #[test]
    fn test_worst_of_matches_registry_levels() {
        let inputs = [
            valid(),
            FeasibilityInput {
                stepover: 1.2,
                ..valid()
            },
            FeasibilityInput {
                feed_z: 2000.0,
                ..valid()
            },
            FeasibilityInput {
                z_rough: 2.0,
                stepdown: 9.0,
                ..valid()
            },
        ];
        for input in &inputs {
            let result = compute_feasibility(input);
            let levels: Vec<_> = result
                .rules_triggered
                .iter()
                .map(|id| lookup(id).unwrap().level)
                .collect();
            let expected = if levels.contains(&RuleLevel::Red) {
                RiskLevel::Red
            } else if levels.is_empty() {
                RiskLevel::Green
            } else {
                RiskLevel::Yellow
            };
            assert_eq!(result.risk_level, expected);
            assert_eq!(result.blocking, expected == RiskLevel::Red);
        }
    }

    #[test]
    fn test_engine_limits_from_config() {
        let engine = FeasibilityEngine::from_config(&FeasibilityConfig {
            max_stepdown_mm: 1.0,
            ..Default::default()
        });
        let input = FeasibilityInput {
            stepdown: 1.5,
            ..valid()
        };
        assert_eq!(engine.limits().max_stepdown_mm, 1.0);
        let result = engine.compute(&input);
        assert_eq!(result.rules_triggered, vec!["F012"]);
        assert_eq!(result.constraints, vec!["stepdown <= 1.0"]);
    }

    #[test]
    fn test_inch_request_checked_in_millimetres() {
        // 0.15in = 3.81mm stepdown, 0.25in = 6.35mm tool against a 5mm feature
        let input = FeasibilityInput {
            units: Units::Inch,
            tool_d: 0.25,
            stepdown: 0.15,
            z_rough: -0.2,
            feed_xy: 40.0,
            feed_z: 10.0,
            safe_z: 0.5,
            smallest_feature_mm: Some(5.0),
            ..valid()
        };
        let result = compute_feasibility(&input);
        assert_eq!(result.risk_level, RiskLevel::Yellow);
        assert_eq!(result.rules_triggered, vec!["F010", "F012"]);
        assert_eq!(result.details.tool_d, 0.25);

        let shallow = FeasibilityInput {
            stepdown: 0.1,
            smallest_feature_mm: None,
            ..input
        };
        assert!(compute_feasibility(&shallow).rules_triggered.is_empty());
    }

    #[test]
    fn test_details_echo_input() {
        let input = FeasibilityInput {
            material_id: Some("ebony".to_string()),
            ..valid()
        };
        let result = compute_feasibility(&input);
        assert_eq!(result.details.tool_d, 6.0);
        assert_eq!(result.details.material_id.as_deref(), Some("ebony"));
        assert_eq!(result.details.request_hash, input.request_hash());
    }
}
