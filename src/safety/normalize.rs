//! Producer-specific payload normalizers.
//!
//! Some producers use their own field names. A normalizer rewrites such a
//! payload into the generic shape before extraction, so aliases never travel
//! past this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

use super::decision::{SafetyDecision, extract_safety_decision};
use crate::json_utils::non_empty_str;

/// Known feasibility payload producers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Producer {
    /// Router/CAM pipelines using `risk_level`
    #[default]
    Generic,
    /// Saw pipelines using `risk_bucket`
    Saw,
}

/// Rewrites a producer's payload into the generic shape
pub trait PayloadNormalizer: Send + Sync {
    fn normalize<'a>(&self, payload: &'a Value) -> Cow<'a, Value>;
}

/// Payload is already in the generic shape
pub struct GenericNormalizer;

impl PayloadNormalizer for GenericNormalizer {
    fn normalize<'a>(&self, payload: &'a Value) -> Cow<'a, Value> {
        Cow::Borrowed(payload)
    }
}

/// Maps `risk_bucket` to `risk_level`, at the top level and inside `safety`.
///
/// The bucket may be a plain string or an enum-like object `{"value": "RED"}`.
/// An existing usable `risk_level` is never overwritten.
pub struct SawNormalizer;

impl SawNormalizer {
    fn bucket_label(obj: &Value) -> Option<String> {
        let bucket = obj.get("risk_bucket")?;
        let label = match bucket {
            Value::String(s) => s.trim(),
            Value::Object(_) => non_empty_str(bucket, "value")?,
            _ => return None,
        };
        (!label.is_empty()).then(|| label.to_string())
    }

    fn alias_in_place(obj: &mut Value) {
        if non_empty_str(obj, "risk_level").is_some() {
            return;
        }
        if let Some(label) = Self::bucket_label(obj)
            && let Some(map) = obj.as_object_mut()
        {
            map.insert("risk_level".to_string(), Value::String(label));
        }
    }
}

impl PayloadNormalizer for SawNormalizer {
    fn normalize<'a>(&self, payload: &'a Value) -> Cow<'a, Value> {
        if !payload.is_object() {
            return Cow::Borrowed(payload);
        }

        let mut normalized = payload.clone();
        Self::alias_in_place(&mut normalized);
        if let Some(safety) = normalized.get_mut("safety")
            && safety.is_object()
        {
            Self::alias_in_place(safety);
        }
        Cow::Owned(normalized)
    }
}

static GENERIC: GenericNormalizer = GenericNormalizer;
static SAW: SawNormalizer = SawNormalizer;

/// Normalizer registered for a producer
pub fn normalizer_for(producer: Producer) -> &'static dyn PayloadNormalizer {
    match producer {
        Producer::Generic => &GENERIC,
        Producer::Saw => &SAW,
    }
}

/// Normalize a producer's payload, then extract the decision
pub fn extract_for_producer(producer: Producer, payload: &Value) -> SafetyDecision {
    let normalized = normalizer_for(producer).normalize(payload);
    extract_safety_decision(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;
    use serde_json::json;

    #[test]
    fn test_saw_bucket_string_at_top_level() {
        let decision = extract_for_producer(Producer::Saw, &json!({"risk_bucket": "red"}));
        assert_eq!(decision.risk_level, RiskLevel::Red);
    }

    #[test]
    fn test_saw_bucket_enum_object_inside_safety() {
        let payload = json!({"safety": {"risk_bucket": {"value": "YELLOW"}, "warnings": ["kerf"]}});
        let decision = extract_for_producer(Producer::Saw, &payload);
        assert_eq!(decision.risk_level, RiskLevel::Yellow);
        assert_eq!(decision.warnings, vec!["kerf"]);
    }

    #[test]
    fn test_saw_does_not_overwrite_risk_level() {
        let payload = json!({"risk_level": "GREEN", "risk_bucket": "RED"});
        let decision = extract_for_producer(Producer::Saw, &payload);
        assert_eq!(decision.risk_level, RiskLevel::Green);
    }

    #[test]
    fn test_generic_ignores_bucket() {
        let decision = extract_for_producer(Producer::Generic, &json!({"risk_bucket": "GREEN"}));
        assert_eq!(decision.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_saw_tolerates_garbage() {
        for payload in [
            Value::Null,
            json!("RED"),
            json!({"risk_bucket": 2}),
            json!({"risk_bucket": {"value": 2}}),
            json!({"safety": "RED"}),
        ] {
            let decision = extract_for_producer(Producer::Saw, &payload);
            assert_eq!(decision.risk_level, RiskLevel::Unknown, "{payload}");
        }
    }

    #[test]
    fn test_generic_borrows() {
        let payload = json!({"risk_level": "GREEN"});
        assert!(matches!(
            normalizer_for(Producer::Generic).normalize(&payload),
            Cow::Borrowed(_)
        ));
    }
}
