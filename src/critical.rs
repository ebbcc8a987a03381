//! Safety-critical component marker.
//!
//! A component whose output decides whether G-code may reach a machine
//! implements `SafetyCritical` and is listed in `SAFETY_CRITICAL_COMPONENTS`.
//! The validation harness records which components a corpus exercised, and
//! the release gate refuses to pass while any listed component is uncovered.

use crate::feasibility::FeasibilityEngine;
use crate::safety::SafetyPolicy;

/// Marker for components that must be covered by the validation harness
pub trait SafetyCritical {
    /// Stable component name used in harness coverage reports
    const COMPONENT: &'static str;
}

/// Every safety-critical component in the crate
pub const SAFETY_CRITICAL_COMPONENTS: &[&str] = &[
    <FeasibilityEngine as SafetyCritical>::COMPONENT,
    <SafetyPolicy as SafetyCritical>::COMPONENT,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_enumerated() {
        assert_eq!(
            SAFETY_CRITICAL_COMPONENTS,
            &["feasibility_engine", "safety_policy"]
        );
    }
}
