use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ArtifactConfig;

use super::{ArtifactError, ArtifactStore, RunArtifact, validate_run_id};

/// File-based artifact store writing one JSON document per run
pub struct FileArtifactStore {
    runs_dir: PathBuf,
}

impl FileArtifactStore {
    pub fn new(config: &ArtifactConfig) -> Self {
        Self {
            runs_dir: config.runs_dir.clone(),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    fn artifact_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{}.json", run_id))
    }

    async fn ensure_runs_dir(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.runs_dir)
            .await
            .map_err(|source| ArtifactError::Io {
                path: self.runs_dir.clone(),
                source,
            })
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `tmp_path`, fsync, then rename onto `path`.
///
/// The temp file is removed on any failure.
async fn write_then_rename(
    tmp_path: &Path,
    path: &Path,
    bytes: &[u8],
) -> Result<(), ArtifactError> {
    let result = async {
        let mut file = fs::File::create(tmp_path).await.map_err(io_err(tmp_path))?;
        file.write_all(bytes).await.map_err(io_err(tmp_path))?;
        file.sync_all().await.map_err(io_err(tmp_path))?;
        drop(file);
        fs::rename(tmp_path, path).await.map_err(io_err(path))
    }
    .await;

    if result.is_err()
        && let Err(e) = fs::remove_file(tmp_path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Failed to remove temp artifact {:?}: {}", tmp_path, e);
    }
    result
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    /// Written through a temp file and a rename; a half-written artifact
    /// never appears under the final name.
    async fn persist(&self, artifact: &RunArtifact) -> Result<(), ArtifactError> {
        validate_run_id(&artifact.run_id)?;
        self.ensure_runs_dir().await?;

        let path = self.artifact_path(&artifact.run_id);
        if fs::try_exists(&path).await.map_err(io_err(&path))? {
            return Err(ArtifactError::AlreadyExists(artifact.run_id.clone()));
        }

        let json = serde_json::to_vec_pretty(artifact)?;
        let tmp_path = self.runs_dir.join(format!(".{}.json.tmp", artifact.run_id));
        write_then_rename(&tmp_path, &path, &json).await?;

        info!(
            "Persisted {:?} artifact {} to {:?}",
            artifact.status, artifact.run_id, path
        );
        Ok(())
    }

    async fn load(&self, run_id: &str) -> Result<RunArtifact, ArtifactError> {
        validate_run_id(run_id)?;
        let path = self.artifact_path(run_id);
        debug!("Loading artifact from {:?}", path);

        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(run_id.to_string()));
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        Ok(serde_json::from_slice(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{RunContext, RunStatus};
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileArtifactStore {
        FileArtifactStore::new(&ArtifactConfig {
            runs_dir: dir.path().join("runs"),
        })
    }

    fn artifact() -> RunArtifact {
        RunArtifact::new(
            RunStatus::Blocked,
            &RunContext::new("body_cavity", "router", "toolpath"),
            "0123abcd",
            json!({"risk_level": "RED", "rules_triggered": ["F001"]}),
        )
        .with_errors(vec!["tool_d must be > 0".to_string()])
    }

    #[tokio::test]
    async fn test_persist_creates_dir_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artifact = artifact();

        store.persist(&artifact).await.unwrap();

        let path = store.runs_dir().join(format!("{}.json", artifact.run_id));
        assert!(path.exists());
        let loaded = store.load(&artifact.run_id).await.unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.content_hash(), artifact.content_hash());
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.persist(&artifact()).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.runs_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let tmp_path = dir.path().join(".run.json.tmp");
        // A non-empty directory cannot be replaced by a file
        let dest = dir.path().join("run.json");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();

        let result = write_then_rename(&tmp_path, &dest, b"{}").await;
        assert!(matches!(result, Err(ArtifactError::Io { .. })));
        assert!(!tmp_path.exists());
        assert!(dest.is_dir());
    }

    #[tokio::test]
    async fn test_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artifact = artifact();
        store.persist(&artifact).await.unwrap();
        assert!(matches!(
            store.persist(&artifact).await,
            Err(ArtifactError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_and_invalid() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.load("missing").await,
            Err(ArtifactError::NotFound(_))
        ));
        assert!(matches!(
            store.load("../escape").await,
            Err(ArtifactError::InvalidRunId(_))
        ));
    }
}
