use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable that toggles blocking on RED
pub const ENV_BLOCK_ON_RED: &str = "BLOCK_ON_RED";
/// Environment variable that toggles blocking on UNKNOWN/ERROR
pub const ENV_TREAT_UNKNOWN_AS_RED: &str = "TREAT_UNKNOWN_AS_RED";

/// Main RMOS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RmosConfig {
    pub safety: SafetyConfig,
    pub feasibility: FeasibilityConfig,
    pub artifacts: ArtifactConfig,
}

/// Safety gate policy flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Block when feasibility is RED
    pub block_on_red: bool,
    /// Block when risk could not be determined (UNKNOWN or ERROR)
    pub treat_unknown_as_red: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            block_on_red: true,
            treat_unknown_as_red: true,
        }
    }
}

/// Thresholds used by the advisory rules
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeasibilityConfig {
    /// Stepdown above this raises a warning (mm)
    pub max_stepdown_mm: f64,
    /// Loop-count hint above this raises a warning
    pub max_loop_count: i64,
    /// Stickout above this multiple of tool diameter raises a warning
    pub max_stickout_ratio: f64,
}

impl Default for FeasibilityConfig {
    fn default() -> Self {
        Self {
            max_stepdown_mm: 3.0,
            max_loop_count: 1000,
            max_stickout_ratio: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Directory for persisted run artifacts.
    /// Defaults to ~/.config/rmos/runs/
    pub runs_dir: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            runs_dir: dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rmos/runs"),
        }
    }
}

impl RmosConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RmosConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if file doesn't exist
    pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) if p.exists() => Self::from_file(p),
            _ => Ok(Self::default()),
        }
    }

    /// Apply `BLOCK_ON_RED` / `TREAT_UNKNOWN_AS_RED` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values keep the current setting.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BLOCK_ON_RED) {
            match parse_flag(&raw) {
                Some(v) => self.safety.block_on_red = v,
                None => warn!("Ignoring unparseable {}={:?}", ENV_BLOCK_ON_RED, raw),
            }
        }
        if let Some(raw) = lookup(ENV_TREAT_UNKNOWN_AS_RED) {
            match parse_flag(&raw) {
                Some(v) => self.safety.treat_unknown_as_red = v,
                None => warn!("Ignoring unparseable {}={:?}", ENV_TREAT_UNKNOWN_AS_RED, raw),
            }
        }
    }
}

/// Parse a boolean flag as written in environment files
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
