// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace provisioning.
//!
//! Materializes a working directory for a session from a repository
//! descriptor and hands back an idempotent cleanup handle. All git work runs
//! through `tokio::process` with a timeout so a hung clone cannot stall the
//! engine. In container mode every kind resolves to its source path and no
//! cleanup is produced.

mod git;

use dock_core::{DockError, RepoDescriptor, RepoKind, SessionId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A provisioned working directory plus its optional cleanup handle.
#[derive(Debug)]
pub struct ProvisionedWorkspace {
    pub path: PathBuf,
    pub cleanup: Option<CleanupHandle>,
}

/// Idempotent, best-effort teardown of a session workspace. Safe to run
/// after the agent child has already terminated, and safe to run twice.
#[derive(Clone, Debug)]
pub struct CleanupHandle {
    inner: Arc<CleanupInner>,
}

#[derive(Debug)]
struct CleanupInner {
    done: AtomicBool,
    kind: CleanupKind,
}

#[derive(Debug)]
enum CleanupKind {
    /// Remove a copied directory tree.
    RemoveDir(PathBuf),
    /// Unregister a git worktree, falling back to directory deletion.
    Worktree(PathBuf),
}

impl CleanupHandle {
    fn remove_dir(path: PathBuf) -> Self {
        Self { inner: Arc::new(CleanupInner { done: AtomicBool::new(false), kind: CleanupKind::RemoveDir(path) }) }
    }

    fn worktree(path: PathBuf) -> Self {
        Self { inner: Arc::new(CleanupInner { done: AtomicBool::new(false), kind: CleanupKind::Worktree(path) }) }
    }

    /// Run the teardown. Failures are logged and ignored; repeat calls are
    /// no-ops.
    pub async fn run(&self) {
        if self.inner.done.swap(true, Ordering::SeqCst) {
            return;
        }
        match &self.inner.kind {
            CleanupKind::RemoveDir(path) => {
                if let Err(e) = tokio::fs::remove_dir_all(path).await {
                    if path.exists() {
                        warn!(path = %path.display(), %e, "workspace removal failed (best-effort)");
                    }
                }
            }
            CleanupKind::Worktree(path) => {
                git::remove_worktree(path).await;
                if path.exists() {
                    if let Err(e) = tokio::fs::remove_dir_all(path).await {
                        warn!(path = %path.display(), %e, "worktree directory removal failed (best-effort)");
                    }
                }
            }
        }
    }
}

/// Provisioner configuration and entry point.
#[derive(Clone)]
pub struct Workspaces {
    /// Root for local-copy session directories.
    pub sessions_base: PathBuf,
    /// Cache root for remote-git clones (`<cache_root>/repos/<repo-id>`).
    pub cache_root: PathBuf,
    /// Container mode: return source paths unchanged, never clean up.
    pub container_mode: bool,
}

impl Workspaces {
    pub fn new(sessions_base: PathBuf, cache_root: PathBuf, container_mode: bool) -> Self {
        Self { sessions_base, cache_root, container_mode }
    }

    /// Materialize a working directory for `session_id`.
    ///
    /// The returned path is absolute and exists at the moment of return.
    /// Failures abort session start with a `workspace` error.
    pub async fn provision(
        &self,
        repo: &RepoDescriptor,
        session_id: SessionId,
    ) -> Result<ProvisionedWorkspace, DockError> {
        if self.container_mode {
            let path = match repo.kind {
                RepoKind::RemoteGit => self.cache_root.join("repos").join(&repo.id),
                _ => PathBuf::from(&repo.source),
            };
            info!(%session_id, path = %path.display(), "container mode: using source path");
            return Ok(ProvisionedWorkspace { path, cleanup: None });
        }

        match repo.kind {
            RepoKind::LocalCopy => self.provision_copy(repo, session_id).await,
            RepoKind::LocalWorktree => {
                let repo_root = PathBuf::from(&repo.source);
                let path = self.worktree_path(&repo_root, repo, session_id);
                git::add_worktree(&repo_root, &path).await?;
                Ok(ProvisionedWorkspace { path: path.clone(), cleanup: Some(CleanupHandle::worktree(path)) })
            }
            RepoKind::RemoteGit => {
                let repo_root = self.cache_root.join("repos").join(&repo.id);
                git::clone_or_fetch(&repo.source, &repo_root).await?;
                let path = self.worktree_path(&repo_root, repo, session_id);
                git::add_worktree(&repo_root, &path).await?;
                Ok(ProvisionedWorkspace { path: path.clone(), cleanup: Some(CleanupHandle::worktree(path)) })
            }
        }
    }

    /// Rebuild the cleanup handle for an already-bound workspace (after a
    /// daemon restart the handle from `provision` is gone).
    pub fn cleanup_for(&self, repo: &RepoDescriptor, path: &Path) -> Option<CleanupHandle> {
        if self.container_mode {
            return None;
        }
        match repo.kind {
            RepoKind::LocalCopy => Some(CleanupHandle::remove_dir(path.to_path_buf())),
            RepoKind::LocalWorktree | RepoKind::RemoteGit => {
                Some(CleanupHandle::worktree(path.to_path_buf()))
            }
        }
    }

    fn worktree_path(&self, repo_root: &Path, repo: &RepoDescriptor, session_id: SessionId) -> PathBuf {
        let name = repo
            .worktree_name
            .clone()
            .unwrap_or_else(|| format!("agentdock-{}", session_id.suffix()));
        repo_root.join(".worktree").join(name)
    }

    async fn provision_copy(
        &self,
        repo: &RepoDescriptor,
        session_id: SessionId,
    ) -> Result<ProvisionedWorkspace, DockError> {
        let source = PathBuf::from(&repo.source);
        if !source.is_dir() {
            return Err(DockError::Workspace(format!(
                "copy source is not a directory: {}",
                source.display()
            )));
        }
        let dest = self.sessions_base.join(session_id.as_str());
        let src = source.clone();
        let dst = dest.clone();
        tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
            .await
            .map_err(|e| DockError::Internal(format!("copy task panicked: {e}")))?
            .map_err(|e| DockError::Workspace(format!("workspace copy failed: {e}")))?;

        info!(%session_id, dest = %dest.display(), "copied workspace");
        Ok(ProvisionedWorkspace { path: dest.clone(), cleanup: Some(CleanupHandle::remove_dir(dest)) })
    }
}

/// Recursively copy a directory tree (blocking; run on the worker pool).
fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let target = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else if ty.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
        // Symlinks and special files are skipped.
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
