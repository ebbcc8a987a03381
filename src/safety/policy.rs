//! Safety gate - the single choke point before machine-executable output.
//!
//! ## Design Philosophy
//!
//! The gate turns a risk level into an allow/block decision:
//! - RED blocks while `block_on_red` is set
//! - UNKNOWN and ERROR block while `treat_unknown_as_red` is set
//! - GREEN and YELLOW never block
//!
//! An allow decision carries an `ExportPermit`. The permit can only be
//! created here and is a required argument of every toolpath generator, so
//! output cannot be produced for a request that did not pass the gate.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::decision::{SafetyDecision, extract_safety_decision};
use crate::config::{RmosConfig, SafetyConfig};
use crate::critical::SafetyCritical;
use crate::models::{FeasibilityResult, RiskLevel};

// ============================================================================
// Gate Outcomes
// ============================================================================

/// Why the gate refused a request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// Feasibility found hard-invalid parameters
    RedFeasibility,
    /// Risk could not be determined
    IndeterminateRisk { level: RiskLevel },
}

/// A refused request, with everything the caller needs to explain it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockedDecision {
    pub reason: BlockReason,
    pub decision: SafetyDecision,
}

/// Proof that a request passed the safety gate.
///
/// Has no public constructor.
#[derive(Debug)]
pub struct ExportPermit {
    decision: SafetyDecision,
}

impl ExportPermit {
    /// The decision this permit was issued for (GREEN or YELLOW, or a level
    /// the policy was configured not to block)
    pub fn decision(&self) -> &SafetyDecision {
        &self.decision
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.decision.risk_level
    }
}

/// Result of passing a decision through the gate
#[derive(Debug)]
pub enum GateDecision {
    Allowed(ExportPermit),
    Blocked(BlockedDecision),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed(_))
    }

    pub fn decision(&self) -> &SafetyDecision {
        match self {
            GateDecision::Allowed(permit) => permit.decision(),
            GateDecision::Blocked(blocked) => &blocked.decision,
        }
    }

    pub fn into_result(self) -> Result<ExportPermit, BlockedDecision> {
        match self {
            GateDecision::Allowed(permit) => Ok(permit),
            GateDecision::Blocked(blocked) => Err(blocked),
        }
    }
}

// ============================================================================
// Safety Policy
// ============================================================================

/// Process-wide gate policy. Flags are fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyPolicy {
    block_on_red: bool,
    treat_unknown_as_red: bool,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self::from_config(&SafetyConfig::default())
    }
}

impl SafetyCritical for SafetyPolicy {
    const COMPONENT: &'static str = "safety_policy";
}

impl SafetyPolicy {
    /// Create the policy from configuration.
    pub fn from_config(config: &SafetyConfig) -> Self {
        Self {
            block_on_red: config.block_on_red,
            treat_unknown_as_red: config.treat_unknown_as_red,
        }
    }

    /// Create the policy from defaults plus `BLOCK_ON_RED` /
    /// `TREAT_UNKNOWN_AS_RED` in the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RmosConfig::default();
        config.apply_overrides_from(lookup);
        Self::from_config(&config.safety)
    }

    pub fn block_on_red(&self) -> bool {
        self.block_on_red
    }

    pub fn treat_unknown_as_red(&self) -> bool {
        self.treat_unknown_as_red
    }

    /// Whether a risk level must stop the operation
    pub fn should_block(&self, risk_level: RiskLevel) -> bool {
        match risk_level {
            RiskLevel::Red => self.block_on_red,
            RiskLevel::Unknown | RiskLevel::Error => self.treat_unknown_as_red,
            RiskLevel::Green | RiskLevel::Yellow => false,
        }
    }

    /// Normalize an arbitrary feasibility payload
    pub fn extract_safety_decision(&self, payload: &Value) -> SafetyDecision {
        extract_safety_decision(payload)
    }

    /// Pass a normalized decision through the gate
    pub fn gate(&self, decision: SafetyDecision) -> GateDecision {
        let level = decision.risk_level;
        if !self.should_block(level) {
            debug!("Safety gate allowed {}", level);
            return GateDecision::Allowed(ExportPermit { decision });
        }

        let reason = if level == RiskLevel::Red {
            BlockReason::RedFeasibility
        } else {
            BlockReason::IndeterminateRisk { level }
        };
        warn!(
            "Safety gate blocked {}: {}",
            level,
            decision.block_reason.as_deref().unwrap_or("no reason recorded")
        );
        GateDecision::Blocked(BlockedDecision { reason, decision })
    }

    /// Gate a result computed in-process
    pub fn gate_result(&self, result: &FeasibilityResult) -> GateDecision {
        self.gate(SafetyDecision::from_result(result))
    }

    /// Gate a raw payload from any producer
    pub fn gate_payload(&self, payload: &Value) -> GateDecision {
        self.gate(self.extract_safety_decision(payload))
    }
}
