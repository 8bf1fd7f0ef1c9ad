// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git subprocess helpers for the workspace provisioner.

use dock_core::DockError;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Generous bound on any single git operation (clones of large repos).
const GIT_TIMEOUT: Duration = Duration::from_secs(300);

async fn run_git(args: &[&str], label: &str) -> Result<std::process::Output, DockError> {
    let mut cmd = Command::new("git");
    cmd.args(args).env_remove("GIT_DIR").env_remove("GIT_WORK_TREE");
    debug!(?args, "running git");
    let output = tokio::time::timeout(GIT_TIMEOUT, cmd.output())
        .await
        .map_err(|_| DockError::Workspace(format!("{label} timed out")))?
        .map_err(|e| DockError::Workspace(format!("{label} failed to start: {e}")))?;
    Ok(output)
}

fn check(output: std::process::Output, label: &str) -> Result<(), DockError> {
    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(DockError::Workspace(format!("{label} failed: {}", stderr.trim())))
    }
}

/// Clone `url` into `repo_root` if missing, otherwise fetch all remotes.
pub(super) async fn clone_or_fetch(url: &str, repo_root: &Path) -> Result<(), DockError> {
    if repo_root.join(".git").exists() {
        let root = repo_root.display().to_string();
        let output = run_git(&["-C", &root, "fetch", "--all"], "git fetch").await?;
        return check(output, "git fetch");
    }

    if let Some(parent) = repo_root.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DockError::Workspace(format!("failed to create cache dir: {e}")))?;
    }
    let dest = repo_root.display().to_string();
    let output = run_git(&["clone", url, &dest], "git clone").await?;
    check(output, "git clone")
}

/// Create a detached worktree at `path` from the repository's current HEAD.
pub(super) async fn add_worktree(repo_root: &Path, path: &Path) -> Result<(), DockError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DockError::Workspace(format!("failed to create worktree parent: {e}")))?;
    }
    let root = repo_root.display().to_string();
    let dest = path.display().to_string();
    let output =
        run_git(&["-C", &root, "worktree", "add", "--detach", &dest, "HEAD"], "git worktree add")
            .await?;
    check(output, "git worktree add")
}

/// Best-effort `git worktree remove --force`; the caller falls back to plain
/// directory deletion when this leaves remnants.
pub(super) async fn remove_worktree(path: &Path) {
    let dest = path.display().to_string();
    let _ = run_git(&["-C", &dest, "worktree", "remove", "--force", &dest], "git worktree remove")
        .await;
}
