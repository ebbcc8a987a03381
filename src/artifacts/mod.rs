//! Run artifacts: the durable audit record of every gate decision.

pub mod files;
pub mod memory;

pub use files::FileArtifactStore;
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use uuid::Uuid;

use crate::feasibility::{DecisionExplanation, explain_decision};
use crate::models::canonical_hash;
use crate::safety::SafetyDecision;

/// Outcome recorded for one request attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Gate allowed and output was generated
    Ok,
    /// Gate refused the request
    Blocked,
    /// Input or generation failed
    Error,
}

/// Who asked for the run and in which workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub tool_id: String,
    pub workflow_mode: String,
    pub event_type: String,
}

impl RunContext {
    pub fn new(
        tool_id: impl Into<String>,
        workflow_mode: impl Into<String>,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            workflow_mode: workflow_mode.into(),
            event_type: event_type.into(),
        }
    }
}

/// Audit record of one gate decision. Written once, never modified.
///
/// `feasibility` is kept as raw JSON so artifacts written by older engine
/// versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub tool_id: String,
    pub workflow_mode: String,
    pub event_type: String,
    pub status: RunStatus,
    pub feasibility: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<SafetyDecision>,
    pub request_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcode_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RunArtifact {
    /// Create an artifact with a fresh run id
    pub fn new(
        status: RunStatus,
        context: &RunContext,
        request_hash: impl Into<String>,
        feasibility: Value,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            tool_id: context.tool_id.clone(),
            workflow_mode: context.workflow_mode.clone(),
            event_type: context.event_type.clone(),
            status,
            feasibility,
            decision: None,
            request_hash: request_hash.into(),
            gcode_hash: None,
            errors: None,
            notes: None,
        }
    }

    pub fn with_decision(mut self, decision: SafetyDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_gcode_hash(mut self, gcode_hash: impl Into<String>) -> Self {
        self.gcode_hash = Some(gcode_hash.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Hash of the full artifact as persisted
    pub fn content_hash(&self) -> String {
        canonical_hash(self)
    }

    /// Registry-only explanation of this artifact's decision
    pub fn explain(&self) -> DecisionExplanation {
        explain_decision(&serde_json::to_value(self).unwrap_or_default())
    }
}

/// Failure to persist or load an artifact
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("artifact {0} not found")]
    NotFound(String),
    #[error("artifact {0} already exists; artifacts are immutable")]
    AlreadyExists(String),
    #[error("invalid run id {0:?}")]
    InvalidRunId(String),
}

/// Durable storage for run artifacts
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persist a new artifact. Fails rather than overwrite an existing run.
    async fn persist(&self, artifact: &RunArtifact) -> Result<(), ArtifactError>;

    /// Load a persisted artifact by run id
    async fn load(&self, run_id: &str) -> Result<RunArtifact, ArtifactError>;
}

/// Run ids become file names, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn validate_run_id(run_id: &str) -> Result<(), ArtifactError> {
    let valid = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ArtifactError::InvalidRunId(run_id.to_string()))
    }
}
