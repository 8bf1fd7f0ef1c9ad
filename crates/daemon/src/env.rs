// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// Agent command override. Defaults to `claude` on PATH.
pub fn agent_cmd() -> String {
    std::env::var("DOCK_AGENT_CMD").unwrap_or_else(|_| "claude".to_string())
}

/// Command path of the out-of-process permission tool, when configured.
/// Absent means agents run without `--permission-prompt-tool`.
pub fn permission_tool_cmd() -> Option<String> {
    std::env::var("DOCK_PERMISSION_TOOL_CMD").ok().filter(|s| !s.is_empty())
}

/// Usage reporter tick interval (default 30s).
pub fn usage_interval() -> Duration {
    std::env::var("DOCK_USAGE_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Snapshot checkpoint interval (default 5 min).
pub fn checkpoint_interval() -> Duration {
    std::env::var("DOCK_CHECKPOINT_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(300))
}

/// Override for the binary re-invoked as the mock agent (defaults to the
/// running daemon binary). Needed when the daemon is embedded, e.g. tests.
pub fn mock_binary() -> Option<PathBuf> {
    std::env::var("DOCK_MOCK_BINARY").ok().map(PathBuf::from)
}

/// Container-mode toggle: workspaces resolve to their source paths and no
/// local copies/worktrees are made.
pub fn container_mode() -> bool {
    std::env::var("DOCK_CONTAINER").map(|v| v == "1" || v == "true").unwrap_or(false)
}

/// Resolve state directory: DOCK_STATE_DIR > XDG_STATE_HOME/agentdock > ~/.local/state/agentdock
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCK_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("agentdock");
    }
    dirs::home_dir().unwrap_or_else(std::env::temp_dir).join(".local/state/agentdock")
}

/// Cache root for remote-git repositories.
pub fn repo_cache_root() -> PathBuf {
    state_dir().join("cache")
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
