pub mod hashing;
pub mod input;
pub mod result;
pub mod risk;

pub use hashing::{canonical_hash, sha256_hex};
pub use input::{BoundingBox, FeasibilityInput, InputError, MaterialHardness, Units};
pub use result::{
    ConstraintOp, FeasibilityDetails, FeasibilityResult, ParsedConstraint, RuleHit, TriggeredRule,
};
pub use risk::{ParseRiskLevelError, RiskLevel, RuleLevel};
