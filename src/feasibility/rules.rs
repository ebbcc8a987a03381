//! Feasibility rules.
//!
//! Every rule is a pure function of the input and the configured limits. A
//! rule inspects only explicit values: an absent hint (`None`) never triggers
//! anything. RED checks are written as negated comparisons so a NaN that
//! slipped past input validation still lands on the blocking side.

#![allow(clippy::neg_cmp_op_on_partial_ord)]

use crate::config::FeasibilityConfig;
use crate::models::{FeasibilityInput, RuleHit, RuleLevel, TriggeredRule};

/// Signature shared by all rule predicates
pub type RuleFn = fn(&FeasibilityInput, &FeasibilityConfig) -> Option<RuleHit>;

/// A rule registered under a stable id
pub struct RuleDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub level: RuleLevel,
    pub check: RuleFn,
}

/// All rules in evaluation order. This order defines `rules_triggered`
/// ordering and must stay stable for replay.
pub static RULES: &[RuleDefinition] = &[
    // Hard-invalid
    RuleDefinition {
        id: "F001",
        name: "tool_diameter_positive",
        level: RuleLevel::Red,
        check: check_tool_diameter,
    },
    RuleDefinition {
        id: "F002",
        name: "stepover_in_range",
        level: RuleLevel::Red,
        check: check_stepover_range,
    },
    RuleDefinition {
        id: "F003",
        name: "stepdown_positive",
        level: RuleLevel::Red,
        check: check_stepdown_positive,
    },
    RuleDefinition {
        id: "F004",
        name: "z_rough_negative",
        level: RuleLevel::Red,
        check: check_z_rough_negative,
    },
    RuleDefinition {
        id: "F005",
        name: "safe_z_positive",
        level: RuleLevel::Red,
        check: check_safe_z_positive,
    },
    RuleDefinition {
        id: "F006",
        name: "closed_loops_present",
        level: RuleLevel::Red,
        check: check_closed_loops,
    },
    // Advisory
    RuleDefinition {
        id: "F010",
        name: "tool_fits_smallest_feature",
        level: RuleLevel::Yellow,
        check: check_tool_vs_feature,
    },
    RuleDefinition {
        id: "F011",
        name: "plunge_feed_not_above_xy_feed",
        level: RuleLevel::Yellow,
        check: check_plunge_feed,
    },
    RuleDefinition {
        id: "F012",
        name: "stepdown_within_max",
        level: RuleLevel::Yellow,
        check: check_stepdown_max,
    },
    RuleDefinition {
        id: "F013",
        name: "loop_count_within_max",
        level: RuleLevel::Yellow,
        check: check_loop_count,
    },
    RuleDefinition {
        id: "F020",
        name: "depth_within_flute_length",
        level: RuleLevel::Yellow,
        check: check_flute_length,
    },
    RuleDefinition {
        id: "F021",
        name: "stickout_within_ratio",
        level: RuleLevel::Yellow,
        check: check_stickout_ratio,
    },
    RuleDefinition {
        id: "F022",
        name: "depth_within_material",
        level: RuleLevel::Yellow,
        check: check_cut_through,
    },
    RuleDefinition {
        id: "F023",
        name: "hard_material_feed_override",
        level: RuleLevel::Yellow,
        check: check_hard_material_override,
    },
];

/// Run every rule in `RULES` order and tag each hit with its rule id.
pub fn all_rules(input: &FeasibilityInput, limits: &FeasibilityConfig) -> Vec<TriggeredRule> {
    RULES
        .iter()
        .filter_map(|rule| {
            (rule.check)(input, limits).map(|hit| TriggeredRule {
                rule_id: rule.id.to_string(),
                hit,
            })
        })
        .collect()
}

/// Look up a rule definition by id
pub fn rule_by_id(id: &str) -> Option<&'static RuleDefinition> {
    RULES.iter().find(|r| r.id == id)
}

/// Render a bound the way constraint consumers expect: whole numbers keep
/// one decimal (`3.0`), others print their shortest exact form.
pub(crate) fn fmt_bound(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

// ============================================================================
// RED rules
// ============================================================================

fn check_tool_diameter(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    (!(input.tool_d > 0.0)).then(|| RuleHit::red("tool_d must be > 0"))
}

fn check_stepover_range(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    let ok = input.stepover > 0.0 && input.stepover <= 0.95;
    (!ok).then(|| RuleHit::red("stepover must be in (0, 0.95]"))
}

fn check_stepdown_positive(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    (!(input.stepdown > 0.0)).then(|| RuleHit::red("stepdown must be > 0"))
}

fn check_z_rough_negative(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    (!(input.z_rough < 0.0)).then(|| RuleHit::red("z_rough must be negative (cut into stock)"))
}

fn check_safe_z_positive(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    (!(input.safe_z > 0.0)).then(|| RuleHit::red("safe_z must be > 0"))
}

fn check_closed_loops(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    let no_closed_paths = input.has_closed_paths == Some(false);
    let zero_loops = input.loop_count_hint.is_some_and(|n| n <= 0);
    (no_closed_paths || zero_loops)
        .then(|| RuleHit::red("geometry must contain at least one closed loop"))
}

// ============================================================================
// YELLOW rules
// ============================================================================

fn check_tool_vs_feature(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    let feature = input.smallest_feature_mm?;
    (input.tool_d > feature).then(|| {
        RuleHit::yellow(format!(
            "tool_d {} exceeds smallest feature {}mm; detail may be unreachable",
            fmt_bound(input.tool_d),
            fmt_bound(feature)
        ))
        .with_constraint(format!("tool_d <= {}", fmt_bound(feature)))
    })
}

fn check_plunge_feed(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    (input.feed_z > input.feed_xy).then(|| {
        RuleHit::yellow(format!(
            "feed_z {} exceeds feed_xy {} (aggressive plunge)",
            fmt_bound(input.feed_z),
            fmt_bound(input.feed_xy)
        ))
    })
}

fn check_stepdown_max(input: &FeasibilityInput, limits: &FeasibilityConfig) -> Option<RuleHit> {
    (input.stepdown > limits.max_stepdown_mm).then(|| {
        RuleHit::yellow(format!(
            "stepdown {} exceeds max {}mm",
            fmt_bound(input.stepdown),
            fmt_bound(limits.max_stepdown_mm)
        ))
        .with_constraint(format!("stepdown <= {}", fmt_bound(limits.max_stepdown_mm)))
    })
}

fn check_loop_count(input: &FeasibilityInput, limits: &FeasibilityConfig) -> Option<RuleHit> {
    let loops = input.loop_count_hint?;
    (loops > limits.max_loop_count).then(|| {
        RuleHit::yellow(format!(
            "loop count {} exceeds max {}; expect long compute and large programs",
            loops, limits.max_loop_count
        ))
    })
}

fn check_flute_length(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    let flute = input.tool_flute_length_mm?;
    let depth = input.z_rough.abs();
    (depth > flute).then(|| {
        RuleHit::yellow(format!(
            "rough depth {}mm exceeds flute length {}mm",
            fmt_bound(depth),
            fmt_bound(flute)
        ))
        .with_constraint(format!("abs(z_rough) <= {}", fmt_bound(flute)))
    })
}

fn check_stickout_ratio(input: &FeasibilityInput, limits: &FeasibilityConfig) -> Option<RuleHit> {
    let stickout = input.tool_stickout_mm?;
    if !(input.tool_d > 0.0) {
        // F001 already blocks; a ratio against a non-positive diameter means nothing
        return None;
    }
    let max_stickout = limits.max_stickout_ratio * input.tool_d;
    (stickout > max_stickout).then(|| {
        RuleHit::yellow(format!(
            "tool stickout {}mm exceeds {}x tool diameter; deflection and chatter likely",
            fmt_bound(stickout),
            fmt_bound(limits.max_stickout_ratio)
        ))
        .with_constraint(format!("tool_stickout_mm <= {}", fmt_bound(max_stickout)))
    })
}

fn check_cut_through(input: &FeasibilityInput, _: &FeasibilityConfig) -> Option<RuleHit> {
    let depth = input.geometry_depth_mm?;
    let thickness = input.material_thickness_mm?;
    (depth > thickness).then(|| {
        RuleHit::yellow(format!(
            "geometry depth {}mm exceeds material thickness {}mm; cut reaches the spoilboard",
            fmt_bound(depth),
            fmt_bound(thickness)
        ))
        .with_constraint(format!("geometry_depth_mm <= {}", fmt_bound(thickness)))
    })
}

fn check_hard_material_override(
    input: &FeasibilityInput,
    _: &FeasibilityConfig,
) -> Option<RuleHit> {
    let hardness = input.material_hardness?;
    let override_pct = input.feed_override_percent?;
    (hardness.is_hard() && override_pct > 100.0).then(|| {
        RuleHit::yellow(format!(
            "feed override {}% on hard material",
            fmt_bound(override_pct)
        ))
        .with_constraint("feed_override_percent <= 100.0")
    })
}
