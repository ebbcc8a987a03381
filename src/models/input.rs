//! Machining-request fingerprint consumed by every feasibility rule.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

use super::hashing::canonical_hash;

/// Millimetres per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Measurement units of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Mm,
    #[serde(alias = "in")]
    Inch,
}

/// Material hardness class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MaterialHardness {
    Soft,
    Medium,
    Hard,
    #[serde(alias = "very_hard")]
    VeryHard,
    Extreme,
    #[default]
    Unknown,
}

impl MaterialHardness {
    /// Hard, very hard and extreme classes
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            MaterialHardness::Hard | MaterialHardness::VeryHard | MaterialHardness::Extreme
        )
    }
}

/// Axis-aligned bounding box of the input geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn scaled(&self, factor: f64) -> Self {
        Self {
            min_x: self.min_x * factor,
            min_y: self.min_y * factor,
            max_x: self.max_x * factor,
            max_y: self.max_y * factor,
        }
    }
}

/// Deterministic snapshot of all machining-relevant parameters for one
/// candidate operation.
///
/// Contains no timestamps, random ids or shared references, so the same
/// parameters always hash to the same `request_hash`. Optional hints are
/// `None` when upstream did not compute them; rules treat `None` as "no
/// information" and never as a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeasibilityInput {
    // Identity / context
    #[serde(default = "default_pipeline_id")]
    pub pipeline_id: String,
    #[serde(default = "default_post_id")]
    pub post_id: String,
    #[serde(default)]
    pub units: Units,
    #[serde(default = "default_layer_name")]
    pub layer_name: String,

    // Core CAM parameters
    /// Tool diameter (mm)
    pub tool_d: f64,
    /// Stepover as a fraction of tool diameter
    pub stepover: f64,
    /// Depth per pass (mm)
    pub stepdown: f64,
    /// Rough-cut Z depth, negative into the stock (mm)
    pub z_rough: f64,
    /// XY feed rate (mm/min)
    pub feed_xy: f64,
    /// Z plunge feed rate (mm/min)
    pub feed_z: f64,
    /// Rapid traverse rate (mm/min)
    #[serde(default = "default_rapid")]
    pub rapid: f64,
    /// Safe retract height (mm)
    pub safe_z: f64,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_climb")]
    pub climb: bool,
    /// Path smoothing tolerance (mm)
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    /// Stock margin left for finishing (mm)
    #[serde(default)]
    pub margin: f64,

    // Geometry summary hints
    #[serde(default)]
    pub has_closed_paths: Option<bool>,
    #[serde(default)]
    pub loop_count_hint: Option<i64>,
    #[serde(default)]
    pub entity_count: Option<u64>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub smallest_feature_mm: Option<f64>,

    // Material / tool / process extensions
    #[serde(default)]
    pub material_id: Option<String>,
    #[serde(default)]
    pub material_hardness: Option<MaterialHardness>,
    #[serde(default)]
    pub material_thickness_mm: Option<f64>,
    #[serde(default)]
    pub is_resinous: Option<bool>,
    #[serde(default)]
    pub geometry_width_mm: Option<f64>,
    #[serde(default)]
    pub geometry_length_mm: Option<f64>,
    #[serde(default)]
    pub geometry_depth_mm: Option<f64>,
    #[serde(default)]
    pub wall_thickness_mm: Option<f64>,
    #[serde(default)]
    pub floor_thickness_mm: Option<f64>,
    #[serde(default)]
    pub has_complex_geometry: Option<bool>,
    #[serde(default)]
    pub tool_flute_length_mm: Option<f64>,
    #[serde(default)]
    pub tool_stickout_mm: Option<f64>,
    #[serde(default)]
    pub coolant_enabled: Option<bool>,
    #[serde(default)]
    pub feed_override_percent: Option<f64>,
}

fn default_pipeline_id() -> String {
    "mvp_dxf_to_grbl".to_string()
}

fn default_post_id() -> String {
    "GRBL".to_string()
}

fn default_layer_name() -> String {
    "GEOMETRY".to_string()
}

fn default_rapid() -> f64 {
    3000.0
}

fn default_strategy() -> String {
    "Spiral".to_string()
}

fn default_climb() -> bool {
    true
}

fn default_smoothing() -> f64 {
    0.1
}

/// Failure to build a `FeasibilityInput` from untrusted data
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("malformed feasibility input: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("field `{field}` must be a finite number")]
    NonFinite { field: &'static str },
}

impl FeasibilityInput {
    /// Build an input from the core CAM parameters with context defaults and
    /// every optional hint left unknown.
    pub fn new(
        tool_d: f64,
        stepover: f64,
        stepdown: f64,
        z_rough: f64,
        feed_xy: f64,
        feed_z: f64,
        safe_z: f64,
    ) -> Self {
        Self {
            pipeline_id: default_pipeline_id(),
            post_id: default_post_id(),
            units: Units::Mm,
            layer_name: default_layer_name(),
            tool_d,
            stepover,
            stepdown,
            z_rough,
            feed_xy,
            feed_z,
            rapid: default_rapid(),
            safe_z,
            strategy: default_strategy(),
            climb: default_climb(),
            smoothing: default_smoothing(),
            margin: 0.0,
            has_closed_paths: None,
            loop_count_hint: None,
            entity_count: None,
            bbox: None,
            smallest_feature_mm: None,
            material_id: None,
            material_hardness: None,
            material_thickness_mm: None,
            is_resinous: None,
            geometry_width_mm: None,
            geometry_length_mm: None,
            geometry_depth_mm: None,
            wall_thickness_mm: None,
            floor_thickness_mm: None,
            has_complex_geometry: None,
            tool_flute_length_mm: None,
            tool_stickout_mm: None,
            coolant_enabled: None,
            feed_override_percent: None,
        }
    }

    /// Translate an untrusted JSON body into an input.
    ///
    /// This is the only fallible step on the evaluation path: unknown fields,
    /// wrong types and non-finite numbers are rejected here, before any rule runs.
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        let input = Self::deserialize(value)?;
        input.validate()?;
        Ok(input)
    }

    /// Reject NaN and infinities in every numeric field.
    pub fn validate(&self) -> Result<(), InputError> {
        let required = [
            ("tool_d", self.tool_d),
            ("stepover", self.stepover),
            ("stepdown", self.stepdown),
            ("z_rough", self.z_rough),
            ("feed_xy", self.feed_xy),
            ("feed_z", self.feed_z),
            ("rapid", self.rapid),
            ("safe_z", self.safe_z),
            ("smoothing", self.smoothing),
            ("margin", self.margin),
        ];
        let optional = [
            ("smallest_feature_mm", self.smallest_feature_mm),
            ("material_thickness_mm", self.material_thickness_mm),
            ("geometry_width_mm", self.geometry_width_mm),
            ("geometry_length_mm", self.geometry_length_mm),
            ("geometry_depth_mm", self.geometry_depth_mm),
            ("wall_thickness_mm", self.wall_thickness_mm),
            ("floor_thickness_mm", self.floor_thickness_mm),
            ("tool_flute_length_mm", self.tool_flute_length_mm),
            ("tool_stickout_mm", self.tool_stickout_mm),
            ("feed_override_percent", self.feed_override_percent),
        ];

        let optional = optional
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)));
        for (field, value) in required.into_iter().chain(optional) {
            if !value.is_finite() {
                return Err(InputError::NonFinite { field });
            }
        }

        if let Some(bbox) = &self.bbox {
            let corners = [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y];
            if corners.iter().any(|v| !v.is_finite()) {
                return Err(InputError::NonFinite { field: "bbox" });
            }
        }

        Ok(())
    }

    /// The same request with every unit-bearing core field in millimetres.
    ///
    /// `_mm` hints are millimetres regardless of `units`; only the core CAM
    /// lengths, feeds and the bounding box follow the request units.
    pub fn in_millimeters(&self) -> Cow<'_, Self> {
        match self.units {
            Units::Mm => Cow::Borrowed(self),
            Units::Inch => {
                let k = MM_PER_INCH;
                Cow::Owned(Self {
                    units: Units::Mm,
                    tool_d: self.tool_d * k,
                    stepdown: self.stepdown * k,
                    z_rough: self.z_rough * k,
                    feed_xy: self.feed_xy * k,
                    feed_z: self.feed_z * k,
                    rapid: self.rapid * k,
                    safe_z: self.safe_z * k,
                    smoothing: self.smoothing * k,
                    margin: self.margin * k,
                    bbox: self.bbox.map(|b| b.scaled(k)),
                    ..self.clone()
                })
            }
        }
    }

    /// Stable SHA-256 over the canonical encoding of every field.
    pub fn request_hash(&self) -> String {
        canonical_hash(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_json() -> Value {
        json!({
            "tool_d": 6.0,
            "stepover": 0.45,
            "stepdown": 1.5,
            "z_rough": -3.0,
            "feed_xy": 1200.0,
            "feed_z": 300.0,
            "safe_z": 5.0
        })
    }

    #[test]
    fn test_from_json_applies_context_defaults() {
        let input = FeasibilityInput::from_json(&valid_json()).unwrap();
        assert_eq!(input.post_id, "GRBL");
        assert_eq!(input.units, Units::Mm);
        assert!(input.climb);
        assert_eq!(input.has_closed_paths, None);
        assert_eq!(input.smallest_feature_mm, None);
        assert_eq!(input.material_hardness, None);
    }

    #[test]
    fn test_from_json_rejects_missing_core_field() {
        let mut body = valid_json();
        body.as_object_mut().unwrap().remove("tool_d");
        let err = FeasibilityInput::from_json(&body).unwrap_err();
        assert!(matches!(err, InputError::Malformed(_)));
    }

    #[test]
    fn test_from_json_rejects_wrong_type_and_unknown_field() {
        let mut body = valid_json();
        body["tool_d"] = json!("six");
        assert!(FeasibilityInput::from_json(&body).is_err());

        let mut body = valid_json();
        body["tool_diameter"] = json!(6.0);
        assert!(FeasibilityInput::from_json(&body).is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        let mut input = FeasibilityInput::new(6.0, 0.45, 1.5, -3.0, 1200.0, 300.0, 5.0);
        input.tool_stickout_mm = Some(f64::INFINITY);
        assert!(matches!(
            input.validate(),
            Err(InputError::NonFinite {
                field: "tool_stickout_mm"
            })
        ));
    }

    #[test]
    fn test_material_hardness_labels() {
        let mut body = valid_json();
        body["material_hardness"] = json!("very-hard");
        let input = FeasibilityInput::from_json(&body).unwrap();
        assert_eq!(input.material_hardness, Some(MaterialHardness::VeryHard));
        assert!(MaterialHardness::VeryHard.is_hard());
        assert!(!MaterialHardness::Medium.is_hard());
    }

    #[test]
    fn test_inch_request_converts_core_lengths_only() {
        let mut body = valid_json();
        body["units"] = json!("in");
        body["tool_d"] = json!(0.25);
        body["smallest_feature_mm"] = json!(5.0);
        let input = FeasibilityInput::from_json(&body).unwrap();
        assert_eq!(input.units, Units::Inch);

        let mm = input.in_millimeters();
        assert_eq!(mm.units, Units::Mm);
        assert!((mm.tool_d - 6.35).abs() < 1e-9);
        assert!((mm.z_rough + 76.2).abs() < 1e-9);
        assert_eq!(mm.stepover, input.stepover);
        assert_eq!(mm.smallest_feature_mm, Some(5.0));
    }

    #[test]
    fn test_mm_request_is_borrowed() {
        let input = FeasibilityInput::from_json(&valid_json()).unwrap();
        assert!(matches!(input.in_millimeters(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_request_hash_is_stable_and_sensitive() {
        let a = FeasibilityInput::from_json(&valid_json()).unwrap();
        let b = FeasibilityInput::from_json(&valid_json()).unwrap();
        assert_eq!(a.request_hash(), b.request_hash());
        assert_eq!(a.request_hash().len(), 64);

        let c = FeasibilityInput {
            stepdown: 1.6,
            ..a.clone()
        };
        assert_ne!(a.request_hash(), c.request_hash());
    }
}
