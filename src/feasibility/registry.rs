//! Static rule metadata.
//!
//! This table is the authority on what a rule id means. It carries no logic
//! so that a stored `rules_triggered` list can be explained long after the
//! evaluation, without running any rule code.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::RuleLevel;

/// Human-readable metadata for one rule id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleMetadata {
    pub level: RuleLevel,
    pub summary: &'static str,
    pub description: &'static str,
    pub operator_hint: &'static str,
}

/// Registry entries in rule id order
pub static RULE_REGISTRY_ENTRIES: &[(&str, RuleMetadata)] = &[
    (
        "F001",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "Invalid tool diameter",
            description: "Tool diameter must be greater than zero.",
            operator_hint: "Select a tool from the library or enter its measured cutting diameter.",
        },
    ),
    (
        "F002",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "Stepover out of range",
            description: "Stepover must be a fraction of tool diameter above 0 and at most 0.95.",
            operator_hint: "Use 0.3 to 0.5 for roughing and 0.1 to 0.2 for finishing.",
        },
    ),
    (
        "F003",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "Invalid stepdown",
            description: "Depth per pass must be greater than zero.",
            operator_hint: "Start with half the tool diameter in softwoods and less in hardwoods.",
        },
    ),
    (
        "F004",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "Rough depth not negative",
            description: "Z depth must be negative: Z0 is the stock top and cutting goes down.",
            operator_hint: "Enter the pocket depth as a negative value, e.g. -3.0.",
        },
    ),
    (
        "F005",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "Unsafe retract height",
            description: "Safe Z must be above the stock top so rapids clear the work and clamps.",
            operator_hint: "Set safe Z above your tallest clamp, typically 5 mm or more.",
        },
    ),
    (
        "F006",
        RuleMetadata {
            level: RuleLevel::Red,
            summary: "No closed geometry",
            description: "Pocketing needs at least one closed loop; the geometry reports none.",
            operator_hint: "Join open segments in the DXF or check that the correct layer is selected.",
        },
    ),
    (
        "F010",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Tool larger than smallest feature",
            description: "The tool is wider than the smallest feature, so some detail will not be cut.",
            operator_hint: "Use a smaller tool for detail passes or accept rounded inside corners.",
        },
    ),
    (
        "F011",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Aggressive plunge feed",
            description: "Z feed is faster than XY feed; straight plunges load the tool tip.",
            operator_hint: "Reduce the plunge feed or switch to a ramping or helical entry.",
        },
    ),
    (
        "F012",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Deep stepdown",
            description: "Depth per pass exceeds the configured maximum for this shop.",
            operator_hint: "Split the cut into more passes or confirm the tool and machine can take it.",
        },
    ),
    (
        "F013",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Very complex geometry",
            description: "Loop count exceeds the configured maximum; toolpath generation will be slow.",
            operator_hint: "Simplify the geometry or split it into several jobs.",
        },
    ),
    (
        "F020",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Depth beyond flute length",
            description: "Rough depth exceeds the cutting length of the tool; the shank will rub.",
            operator_hint: "Use a longer-flute tool or reduce the cut depth.",
        },
    ),
    (
        "F021",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Long tool stickout",
            description: "Stickout is large relative to diameter; expect deflection and chatter.",
            operator_hint: "Seat the tool deeper in the collet or lower feeds and stepdown.",
        },
    ),
    (
        "F022",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Cut deeper than material",
            description: "Geometry depth exceeds material thickness; the cut reaches the spoilboard.",
            operator_hint: "Confirm a through-cut is intended and the spoilboard is sacrificial.",
        },
    ),
    (
        "F023",
        RuleMetadata {
            level: RuleLevel::Yellow,
            summary: "Feed override on hard material",
            description: "A feed override above 100% is set for a hard material class.",
            operator_hint: "Run hard woods such as ebony at or below programmed feed.",
        },
    ),
];

static RULE_REGISTRY: Lazy<HashMap<&'static str, RuleMetadata>> =
    Lazy::new(|| RULE_REGISTRY_ENTRIES.iter().copied().collect());

/// Look up metadata by rule id
pub fn lookup(rule_id: &str) -> Option<&'static RuleMetadata> {
    RULE_REGISTRY.get(rule_id)
}
