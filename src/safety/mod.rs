//! Safety gate: payload normalization and the allow/block policy.

pub mod decision;
pub mod normalize;
pub mod policy;

pub use decision::{EXTRACTION_FAILED_REASON, PayloadShape, SafetyDecision, extract_safety_decision};
pub use normalize::{
    GenericNormalizer, PayloadNormalizer, Producer, SawNormalizer, extract_for_producer,
    normalizer_for,
};
pub use policy::{BlockReason, BlockedDecision, ExportPermit, GateDecision, SafetyPolicy};
