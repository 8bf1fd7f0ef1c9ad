// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository descriptors consumed by the workspace provisioner.

use serde::{Deserialize, Serialize};

/// How a session's working directory is materialized from a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepoKind {
    /// Recursively copy the source tree into a per-session directory.
    LocalCopy,
    /// Create a git worktree under `<repo>/.worktree/`.
    LocalWorktree,
    /// Clone (or fetch) into a shared cache, then worktree inside it.
    RemoteGit,
}

/// Input to the workspace provisioner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDescriptor {
    pub kind: RepoKind,
    /// Source path (local kinds) or clone URL (remote-git).
    pub source: String,
    /// Stable repository id, shared across sessions of the same repo.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_name: Option<String>,
}

impl RepoDescriptor {
    pub fn local_copy(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self { kind: RepoKind::LocalCopy, source: source.into(), id: id.into(), worktree_name: None }
    }

    pub fn local_worktree(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: RepoKind::LocalWorktree,
            source: source.into(),
            id: id.into(),
            worktree_name: None,
        }
    }

    pub fn remote_git(url: impl Into<String>, id: impl Into<String>) -> Self {
        Self { kind: RepoKind::RemoteGit, source: url.into(), id: id.into(), worktree_name: None }
    }

    pub fn with_worktree_name(mut self, name: impl Into<String>) -> Self {
        self.worktree_name = Some(name.into());
        self
    }
}

#[cfg(test)]
#[path = "repo_tests.rs"]
mod tests;
