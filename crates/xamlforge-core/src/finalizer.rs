//! Moves build output from a workspace to the caller's destination.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

use crate::domain::error::{BuildError, BuildResult};
use crate::domain::outcome::Artifacts;
use crate::domain::request::BuildRequest;
use crate::obs;
use crate::workspace::BuildWorkspace;

/// What finalization did with the workspace contents.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FinalizeReport {
    pub artifacts: Option<Artifacts>,

    /// Set when the workspace was left on disk.
    pub retained_workspace: Option<PathBuf>,
}

/// Place the assembly (and its `.pdb` when debug info was requested) at the
/// request's output path, then remove the workspace.
///
/// A missing assembly is not an error: the report carries no artifacts and
/// the workspace stays for inspection. Failing to place a file that does
/// exist is [`BuildError::Finalize`], and the workspace is kept as well.
pub async fn finalize(
    request: &BuildRequest,
    workspace: &BuildWorkspace,
    keep_workspace: bool,
) -> BuildResult<FinalizeReport> {
    let produced = workspace.path().join(request.artifact_file_name());
    if !exists(&produced).await {
        obs::emit_workspace_retained(workspace.path(), "no assembly produced");
        return Ok(FinalizeReport {
            artifacts: None,
            retained_workspace: Some(workspace.path().to_path_buf()),
        });
    }

    let destination = request.output().to_path_buf();
    let placed = place_artifacts(request, &produced, &destination).await;
    let artifacts = match placed {
        Ok(artifacts) => artifacts,
        Err(e) => {
            obs::emit_workspace_retained(workspace.path(), "artifact placement failed");
            return Err(e);
        }
    };

    let retained_workspace = if keep_workspace {
        obs::emit_workspace_retained(workspace.path(), "keep_workspace is set");
        Some(workspace.path().to_path_buf())
    } else {
        workspace.cleanup().await;
        None
    };

    Ok(FinalizeReport {
        artifacts: Some(artifacts),
        retained_workspace,
    })
}

async fn place_artifacts(
    request: &BuildRequest,
    produced: &Path,
    destination: &Path,
) -> BuildResult<Artifacts> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| finalize_error(produced, destination, source))?;
    }

    place(produced, destination).await?;

    // Symbols must move before the workspace is removed.
    let mut debug_symbols = None;
    if request.debug() {
        let pdb_from = produced.with_extension("pdb");
        if exists(&pdb_from).await {
            let pdb_to = destination.with_extension("pdb");
            place(&pdb_from, &pdb_to).await?;
            debug_symbols = Some(pdb_to);
        }
    }

    let bytes = fs::read(destination)
        .await
        .map_err(|source| finalize_error(produced, destination, source))?;
    let assembly_sha256 = hex::encode(Sha256::digest(&bytes));

    debug!(
        assembly = %destination.display(),
        sha256 = %assembly_sha256,
        "artifact placed"
    );
    Ok(Artifacts {
        assembly: destination.to_path_buf(),
        debug_symbols,
        assembly_sha256,
    })
}

/// Overwrite an existing destination by copying; otherwise move, falling
/// back to copy and delete when a rename crosses filesystems.
async fn place(from: &Path, to: &Path) -> BuildResult<()> {
    if exists(to).await {
        fs::copy(from, to)
            .await
            .map_err(|source| finalize_error(from, to, source))?;
        return Ok(());
    }

    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    fs::copy(from, to)
        .await
        .map_err(|source| finalize_error(from, to, source))?;
    if let Err(e) = fs::remove_file(from).await {
        debug!(path = %from.display(), error = %e, "could not remove moved artifact source");
    }
    Ok(())
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

fn finalize_error(from: &Path, to: &Path, source: std::io::Error) -> BuildError {
    BuildError::Finalize {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    }
}
