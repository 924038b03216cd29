//! Per-request job directories.
//!
//! Every request gets a fresh directory under the storage root, named by a
//! UUIDv7. The [`Job`] value owns that directory: releasing or dropping it
//! removes the directory unless the workspace was built with `retain_jobs`.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::WorkspaceError;
use crate::models::ArtifactRole;

/// Allocates job directories under a single storage root.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    root: PathBuf,
    retain_jobs: bool,
}

impl JobWorkspace {
    /// Create a workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, retain_jobs: bool) -> Self {
        Self {
            root: root.into(),
            retain_jobs,
        }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), WorkspaceError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Unavailable {
                root: self.root.clone(),
                source,
            })
    }

    /// Allocate a directory for a new job.
    ///
    /// Uses a non-recursive create so a pre-existing directory surfaces as
    /// [`WorkspaceError::Collision`]; collisions are not retried.
    pub async fn create_job(&self) -> Result<Job, WorkspaceError> {
        let id = Uuid::now_v7();
        let dir = self.root.join(id.to_string());

        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::Collision { path: dir });
            }
            Err(source) => {
                return Err(WorkspaceError::Unavailable {
                    root: self.root.clone(),
                    source,
                });
            }
        }

        debug!(job_id = %id, dir = %dir.display(), "Job directory created");

        Ok(Job {
            id,
            dir,
            retain: self.retain_jobs,
            released: false,
        })
    }

    /// Remove job directories last modified more than `max_age` ago.
    ///
    /// Only directories named by a UUIDv7, as [`create_job`](Self::create_job)
    /// names them, are candidates; anything else under the root is left alone.
    /// Returns the number of directories removed. Entries that cannot be
    /// inspected or removed are logged and skipped.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize, WorkspaceError> {
        let mut entries =
            tokio::fs::read_dir(&self.root)
                .await
                .map_err(|source| WorkspaceError::Unavailable {
                    root: self.root.clone(),
                    source,
                })?;

        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %self.root.display(), error = %e, "Failed to list storage root");
                    break;
                }
            };

            if !is_job_dir_name(&entry.file_name().to_string_lossy()) {
                continue;
            }

            let path = entry.path();
            let modified = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => meta.modified().ok(),
                _ => continue,
            };

            if modified.is_some_and(|m| m < cutoff) {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(dir = %path.display(), error = %e, "Failed to remove stale job directory");
                    }
                }
            }
        }

        if removed > 0 {
            info!(removed, root = %self.root.display(), "Swept stale job directories");
        }

        Ok(removed)
    }
}

fn is_job_dir_name(name: &str) -> bool {
    Uuid::parse_str(name).is_ok_and(|id| id.get_version_num() == 7)
}

/// One request's isolated directory and its artifacts.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    dir: PathBuf,
    retain: bool,
    released: bool,
}

impl Job {
    /// Unique job identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The job's directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact with the given role.
    pub fn artifact_path(&self, role: ArtifactRole) -> PathBuf {
        self.dir.join(role.file_name())
    }

    /// Whether the artifact exists as a file of at least `min_bytes`.
    pub async fn has_artifact(&self, role: ArtifactRole, min_bytes: u64) -> bool {
        match tokio::fs::metadata(self.artifact_path(role)).await {
            Ok(meta) => meta.is_file() && meta.len() >= min_bytes,
            Err(_) => false,
        }
    }

    /// Remove the job directory (best-effort).
    pub async fn release(mut self) {
        self.released = true;
        if self.retain {
            debug!(job_id = %self.id, "Retaining job directory");
            return;
        }
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            warn!(
                job_id = %self.id,
                dir = %self.dir.display(),
                error = %e,
                "Failed to clean up job directory"
            );
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if self.released || self.retain {
            return;
        }
        let (id, dir) = (self.id, std::mem::take(&mut self.dir));
        let remove = move || {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        job_id = %id,
                        dir = %dir.display(),
                        error = %e,
                        "Failed to clean up dropped job directory"
                    );
                }
            }
        };

        // Off the async workers when inside a runtime.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(remove);
            }
            Err(_) => remove(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_job_allocates_fresh_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), false);

        let a = workspace.create_job().await.expect("job a");
        let b = workspace.create_job().await.expect("job b");

        assert_ne!(a.id(), b.id());
        assert_ne!(a.dir(), b.dir());
        assert!(a.dir().is_dir());
        assert_eq!(a.dir(), root.path().join(a.id().to_string()));
        assert_eq!(
            a.artifact_path(ArtifactRole::Input),
            a.dir().join("input.glb")
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_unavailable() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path().join("missing"), false);

        let result = workspace.create_job().await;
        assert!(matches!(result, Err(WorkspaceError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_has_artifact_requires_size() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), false);
        let job = workspace.create_job().await.expect("job");

        assert!(!job.has_artifact(ArtifactRole::Output, 1).await);
        std::fs::write(job.artifact_path(ArtifactRole::Output), b"").expect("write");
        assert!(!job.has_artifact(ArtifactRole::Output, 1).await);
        std::fs::write(job.artifact_path(ArtifactRole::Output), b"ISO-10303-21;").expect("write");
        assert!(job.has_artifact(ArtifactRole::Output, 1).await);
    }

    #[tokio::test]
    async fn test_release_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), false);
        let job = workspace.create_job().await.expect("job");
        let dir = job.dir().to_path_buf();
        std::fs::write(job.artifact_path(ArtifactRole::Input), b"glTF").expect("write");

        job.release().await;
        assert!(!dir.exists());
    }

    async fn wait_until_removed(dir: &Path) -> bool {
        for _ in 0..200 {
            if !dir.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), false);
        let dir = {
            let job = workspace.create_job().await.expect("job");
            std::fs::write(job.artifact_path(ArtifactRole::Input), b"glTF").expect("write");
            job.dir().to_path_buf()
        };
        assert!(wait_until_removed(&dir).await);
    }

    #[test]
    fn test_drop_outside_runtime_removes_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().join(Uuid::now_v7().to_string());
        std::fs::create_dir(&dir).expect("mkdir");

        drop(Job {
            id: Uuid::now_v7(),
            dir: dir.clone(),
            retain: false,
            released: false,
        });
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_retained_job_survives_release_and_drop() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), true);

        let released = workspace.create_job().await.expect("job");
        let released_dir = released.dir().to_path_buf();
        released.release().await;

        let dropped_dir = {
            let job = workspace.create_job().await.expect("job");
            job.dir().to_path_buf()
        };

        assert!(released_dir.is_dir());
        assert!(dropped_dir.is_dir());
    }

    #[tokio::test]
    async fn test_sweep_stale_respects_age() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), true);
        let job = workspace.create_job().await.expect("job");

        let removed = workspace
            .sweep_stale(Duration::from_secs(3600))
            .await
            .expect("sweep");
        assert_eq!(removed, 0);
        assert!(job.dir().is_dir());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = workspace.sweep_stale(Duration::ZERO).await.expect("sweep");
        assert_eq!(removed, 1);
        assert!(!job.dir().exists());
    }

    #[tokio::test]
    async fn test_sweep_leaves_foreign_directories() {
        let root = tempfile::tempdir().expect("tempdir");
        let workspace = JobWorkspace::new(root.path(), true);
        let job = workspace.create_job().await.expect("job");

        let backups = root.path().join("customer-backups");
        std::fs::create_dir(&backups).expect("mkdir");
        std::fs::write(backups.join("precious.db"), b"data").expect("write");
        let v4_named = root.path().join("6f1c2b3a-9d4e-4f5a-8b6c-7d8e9f0a1b2c");
        std::fs::create_dir(&v4_named).expect("mkdir");

        tokio::time::sleep(Duration::from_millis(20)).await;
        let removed = workspace
            .sweep_stale(Duration::from_millis(1))
            .await
            .expect("sweep");

        assert_eq!(removed, 1);
        assert!(!job.dir().exists());
        assert!(backups.join("precious.db").is_file());
        assert!(v4_named.is_dir());
    }

    #[test]
    fn test_job_dir_name_requires_uuid_v7() {
        assert!(is_job_dir_name(&Uuid::now_v7().to_string()));
        assert!(!is_job_dir_name("6f1c2b3a-9d4e-4f5a-8b6c-7d8e9f0a1b2c"));
        assert!(!is_job_dir_name("customer-backups"));
        assert!(!is_job_dir_name("."));
    }
}
