//! Per-build temporary directories.
//!
//! Layout: `<temp_root>/<namespace>/<uuid>/`, holding the rendered
//! `<name>.sln` and `<name>.csproj` plus whatever the build tool writes.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::error::{BuildError, BuildResult};
use crate::obs;
use crate::template::RenderedProject;

/// Paths of the descriptors written into a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenProject {
    pub solution_path: PathBuf,
    pub project_path: PathBuf,
}

/// A uniquely named directory owned by one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildWorkspace {
    token: Uuid,
    dir: PathBuf,
}

impl BuildWorkspace {
    /// Pick a fresh directory under `root`. Nothing touches the disk yet.
    pub fn allocate(root: &Path) -> Self {
        let token = Uuid::new_v4();
        Self {
            dir: root.join(token.to_string()),
            token,
        }
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create the directory, first removing a stale one of the same name.
    pub async fn prepare(&self) -> BuildResult<()> {
        if fs::try_exists(&self.dir).await.unwrap_or(false) {
            debug!(path = %self.dir.display(), "removing stale workspace");
            fs::remove_dir_all(&self.dir)
                .await
                .map_err(|source| self.io_error(source))?;
        }
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| self.io_error(source))
    }

    /// Write both descriptors.
    pub async fn write(&self, rendered: &RenderedProject) -> BuildResult<WrittenProject> {
        let solution_path = self.dir.join(&rendered.solution_file_name);
        let project_path = self.dir.join(&rendered.project_file_name);

        fs::write(&solution_path, &rendered.solution)
            .await
            .map_err(|source| self.io_error(source))?;
        fs::write(&project_path, &rendered.project)
            .await
            .map_err(|source| self.io_error(source))?;

        debug!(
            solution = %solution_path.display(),
            project = %project_path.display(),
            "descriptors written"
        );
        Ok(WrittenProject {
            solution_path,
            project_path,
        })
    }

    /// Delete the directory. Failures are logged and otherwise ignored.
    pub async fn cleanup(&self) {
        if let Err(e) = fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                obs::emit_cleanup_failed(&self.dir, &e);
            }
        }
    }

    fn io_error(&self, source: std::io::Error) -> BuildError {
        BuildError::Workspace {
            path: self.dir.clone(),
            source,
        }
    }
}
