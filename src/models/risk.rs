use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregated risk classification for one machining request.
///
/// `Unknown` and `Error` never come out of rule evaluation. They are produced
/// when a payload is missing or malformed (`Unknown`) or when the engine could
/// not be run at all (`Error`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Green,
    Yellow,
    Red,
    Unknown,
    Error,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Green => "GREEN",
            RiskLevel::Yellow => "YELLOW",
            RiskLevel::Red => "RED",
            RiskLevel::Unknown => "UNKNOWN",
            RiskLevel::Error => "ERROR",
        }
    }

    /// Parse a producer-supplied label, trimming and case-normalizing it.
    ///
    /// Anything unrecognized resolves to `Unknown`, never to a permissive level.
    pub fn parse_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or(RiskLevel::Unknown)
    }

    /// True for the levels that mean "risk could not be determined".
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, RiskLevel::Unknown | RiskLevel::Error)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a risk label that is not one of the five known levels
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized risk level: {0:?}")]
pub struct ParseRiskLevelError(pub String);

impl FromStr for RiskLevel {
    type Err = ParseRiskLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GREEN" => Ok(RiskLevel::Green),
            "YELLOW" => Ok(RiskLevel::Yellow),
            "RED" => Ok(RiskLevel::Red),
            "UNKNOWN" => Ok(RiskLevel::Unknown),
            "ERROR" => Ok(RiskLevel::Error),
            _ => Err(ParseRiskLevelError(s.to_string())),
        }
    }
}

/// Severity a single rule can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleLevel {
    /// Hard-invalid, always blocks
    Red,
    /// Advisory, needs operator attention
    Yellow,
}

impl RuleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleLevel::Red => "RED",
            RuleLevel::Yellow => "YELLOW",
        }
    }
}

impl From<RuleLevel> for RiskLevel {
    fn from(level: RuleLevel) -> Self {
        match level {
            RuleLevel::Red => RiskLevel::Red,
            RuleLevel::Yellow => RiskLevel::Yellow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(RiskLevel::parse_lenient("red"), RiskLevel::Red);
        assert_eq!(RiskLevel::parse_lenient("  Yellow "), RiskLevel::Yellow);
        assert_eq!(RiskLevel::parse_lenient("GREEN"), RiskLevel::Green);
        assert_eq!(RiskLevel::parse_lenient("error"), RiskLevel::Error);
    }

    #[test]
    fn test_unrecognized_label_is_unknown() {
        assert_eq!(RiskLevel::parse_lenient("ORANGE"), RiskLevel::Unknown);
        assert_eq!(RiskLevel::parse_lenient(""), RiskLevel::Unknown);
        assert!("purple".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_serde_uses_uppercase_labels() {
        let json = serde_json::to_string(&RiskLevel::Yellow).unwrap();
        assert_eq!(json, "\"YELLOW\"");
        let level: RiskLevel = serde_json::from_str("\"UNKNOWN\"").unwrap();
        assert_eq!(level, RiskLevel::Unknown);
    }

    #[test]
    fn test_rule_level_maps_to_risk_level() {
        assert_eq!(RiskLevel::from(RuleLevel::Red), RiskLevel::Red);
        assert_eq!(RiskLevel::from(RuleLevel::Yellow), RiskLevel::Yellow);
        assert!(RiskLevel::Error.is_indeterminate());
        assert!(!RiskLevel::Red.is_indeterminate());
    }
}
