use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{ArtifactError, ArtifactStore, RunArtifact, validate_run_id};

/// In-process artifact store for tests and harness replays
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<BTreeMap<String, RunArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored artifact, ordered by run id
    pub fn artifacts(&self) -> Vec<RunArtifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn persist(&self, artifact: &RunArtifact) -> Result<(), ArtifactError> {
        validate_run_id(&artifact.run_id)?;
        let mut artifacts = self
            .artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if artifacts.contains_key(&artifact.run_id) {
            return Err(ArtifactError::AlreadyExists(artifact.run_id.clone()));
        }
        artifacts.insert(artifact.run_id.clone(), artifact.clone());
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<RunArtifact, ArtifactError> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(run_id)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(run_id.to_string()))
    }
}
