//! Registry-only explanation of stored decisions.
//!
//! Explanations are derived from rule ids alone: nothing here re-runs a rule.
//! Every function is total over arbitrary JSON because it may be handed
//! artifacts written by older engine versions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::registry::lookup;
use crate::json_utils::{non_empty_str, object_field};
use crate::models::{FeasibilityResult, RiskLevel};

/// One triggered rule resolved against the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainedRule {
    pub rule_id: String,
    /// Registry level, or `UNKNOWN` when the id is not registered
    pub level: RiskLevel,
    pub summary: String,
    pub description: String,
    pub operator_hint: String,
}

/// UI-ready explanation of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionExplanation {
    pub risk_level: RiskLevel,
    pub summary: String,
    pub triggered_rules: Vec<ExplainedRule>,
    #[serde(default)]
    pub override_reason: Option<String>,
}

/// Resolve rule ids against the registry, preserving order.
///
/// Unregistered ids get a fallback entry with level `UNKNOWN`; they are never
/// dropped and their meaning is never guessed.
pub fn explain_rules<S: AsRef<str>>(rule_ids: &[S]) -> Vec<ExplainedRule> {
    rule_ids
        .iter()
        .map(|id| {
            let id = id.as_ref();
            match lookup(id) {
                Some(meta) => ExplainedRule {
                    rule_id: id.to_string(),
                    level: meta.level.into(),
                    summary: meta.summary.to_string(),
                    description: meta.description.to_string(),
                    operator_hint: meta.operator_hint.to_string(),
                },
                None => ExplainedRule {
                    rule_id: id.to_string(),
                    level: RiskLevel::Unknown,
                    summary: format!("Rule {} is not in the registry", id),
                    description: format!(
                        "No registry entry exists for rule {}; it may come from a different engine version.",
                        id
                    ),
                    operator_hint: "Review the original run artifact for details.".to_string(),
                },
            }
        })
        .collect()
}

/// Templated one-line summary for a level and rule count
pub fn summarize(risk_level: RiskLevel, rule_count: usize) -> String {
    match risk_level {
        RiskLevel::Green => "All checks passed".to_string(),
        RiskLevel::Yellow => format!("Manual review required ({} warning(s))", rule_count),
        RiskLevel::Red => format!("Blocked ({} critical issue(s))", rule_count),
        RiskLevel::Unknown | RiskLevel::Error => "Status unknown".to_string(),
    }
}

/// Explain a run artifact or any `{feasibility, decision, override_reason}`
/// shaped payload.
///
/// Risk level comes from `decision.risk_level`, then `feasibility.risk_level`,
/// then defaults to `UNKNOWN`.
pub fn explain_decision(payload: &Value) -> DecisionExplanation {
    let feasibility = object_field(payload, "feasibility");
    let decision = object_field(payload, "decision");

    let risk_level = decision
        .and_then(|d| non_empty_str(d, "risk_level"))
        .or_else(|| feasibility.and_then(|f| non_empty_str(f, "risk_level")))
        .map(RiskLevel::parse_lenient)
        .unwrap_or(RiskLevel::Unknown);

    let rule_ids: Vec<String> = feasibility
        .and_then(|f| f.get("rules_triggered"))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .map(|id| match id.as_str() {
                    Some(s) => s.to_string(),
                    None => id.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let override_reason = non_empty_str(payload, "override_reason")
        .or_else(|| decision.and_then(|d| non_empty_str(d, "override_reason")))
        .map(str::to_string);

    DecisionExplanation {
        risk_level,
        summary: summarize(risk_level, rule_ids.len()),
        triggered_rules: explain_rules(&rule_ids),
        override_reason,
    }
}

/// Explain a freshly computed result
pub fn explain_result(result: &FeasibilityResult) -> DecisionExplanation {
    DecisionExplanation {
        risk_level: result.risk_level,
        summary: summarize(result.risk_level, result.rules_triggered.len()),
        triggered_rules: explain_rules(&result.rules_triggered),
        override_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::compute_feasibility;
    use crate::models::FeasibilityInput;
    use serde_json::json;

    #[test]
    fn test_unknown_rule_gets_fallback() {
        let explained = explain_rules(&["F001", "X404"]);
        assert_eq!(explained.len(), 2);
        assert_eq!(explained[0].level, RiskLevel::Red);
        assert_eq!(explained[1].rule_id, "X404");
        assert_eq!(explained[1].level, RiskLevel::Unknown);
        assert!(explained[1].summary.contains("not in the registry"));
    }

    #[test]
    fn test_summary_templates() {
        assert_eq!(summarize(RiskLevel::Green, 0), "All checks passed");
        assert_eq!(
            summarize(RiskLevel::Yellow, 2),
            "Manual review required (2 warning(s))"
        );
        assert_eq!(summarize(RiskLevel::Red, 1), "Blocked (1 critical issue(s))");
        assert_eq!(summarize(RiskLevel::Unknown, 3), "Status unknown");
        assert_eq!(summarize(RiskLevel::Error, 0), "Status unknown");
    }

    #[test]
    fn test_decision_level_preferred_over_feasibility() {
        let payload = json!({
            "feasibility": {"risk_level": "YELLOW", "rules_triggered": ["F011"]},
            "decision": {"risk_level": "red"},
            "override_reason": "operator forced review"
        });
        let explanation = explain_decision(&payload);
        assert_eq!(explanation.risk_level, RiskLevel::Red);
        assert_eq!(explanation.summary, "Blocked (1 critical issue(s))");
        assert_eq!(
            explanation.override_reason.as_deref(),
            Some("operator forced review")
        );
    }

    #[test]
    fn test_falls_back_to_feasibility_then_unknown() {
        let payload = json!({"feasibility": {"risk_level": "GREEN", "rules_triggered": []}});
        assert_eq!(explain_decision(&payload).risk_level, RiskLevel::Green);

        let payload = json!({"decision": {"risk_level": 5}});
        let explanation = explain_decision(&payload);
        assert_eq!(explanation.risk_level, RiskLevel::Unknown);
        assert_eq!(explanation.summary, "Status unknown");
    }

    #[test]
    fn test_total_over_garbage() {
        for payload in [
            Value::Null,
            json!([]),
            json!("RED"),
            json!({"feasibility": "nope"}),
            json!({"feasibility": {"rules_triggered": "F001"}}),
            json!({"feasibility": {"rules_triggered": [1, null, "F003"]}}),
        ] {
            let explanation = explain_decision(&payload);
            assert_eq!(explanation.risk_level, RiskLevel::Unknown);
        }

        let mixed = explain_decision(&json!({"feasibility": {"rules_triggered": [1, "F003"]}}));
        assert_eq!(mixed.triggered_rules.len(), 2);
        assert_eq!(mixed.triggered_rules[0].level, RiskLevel::Unknown);
        assert_eq!(mixed.triggered_rules[1].rule_id, "F003");
    }

    #[test]
    fn test_round_trip_preserves_rule_order() {
        let input = FeasibilityInput {
            smallest_feature_mm: Some(2.0),
            ..FeasibilityInput::new(6.0, 0.5, 5.0, 1.0, 1000.0, 2000.0, 5.0)
        };
        let result = compute_feasibility(&input);
        let payload = json!({ "feasibility": result });
        let explanation = explain_decision(&payload);

        let ids: Vec<_> = explanation
            .triggered_rules
            .iter()
            .map(|r| r.rule_id.clone())
            .collect();
        assert_eq!(ids, result.rules_triggered);
        assert!(explanation.triggered_rules.iter().all(|r| r.level != RiskLevel::Unknown));
        assert_eq!(explanation, explain_result(&result));
    }
}
