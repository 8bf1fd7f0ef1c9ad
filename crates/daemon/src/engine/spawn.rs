// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent command-line assembly.

use crate::agent::SpawnSpec;
use dock_core::{DockError, Session};
use std::path::PathBuf;

/// How to invoke the agent CLI.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    pub program: String,
    /// Arguments ahead of everything else (`["mock-agent"]` in mock mode).
    pub args_prefix: Vec<String>,
    /// Out-of-process permission tool; routes tool-call prompts through the
    /// permission service when configured.
    pub permission_tool_cmd: Option<String>,
}

impl AgentCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args_prefix: vec![], permission_tool_cmd: None }
    }

    pub fn mock(dockd_binary: impl Into<String>) -> Self {
        Self {
            program: dockd_binary.into(),
            args_prefix: vec!["mock-agent".to_string()],
            permission_tool_cmd: None,
        }
    }
}

/// Name of the permission tool as exposed through the MCP config.
const PERMISSION_TOOL_NAME: &str = "mcp__agentdock__approve";

/// Path of the transient MCP config for a session.
pub fn mcp_config_path(session_id: dock_core::SessionId) -> PathBuf {
    std::env::temp_dir().join("agent-dock-mcp").join(format!("mcp-config-{session_id}.json"))
}

/// Write the transient MCP config file routing permission prompts through
/// the configured tool command. Removed again on child exit.
pub fn write_mcp_config(
    session_id: dock_core::SessionId,
    tool_cmd: &str,
) -> Result<PathBuf, DockError> {
    let path = mcp_config_path(session_id);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| DockError::Internal(format!("mcp config dir: {e}")))?;
    }
    let config = serde_json::json!({
        "mcpServers": {
            "agentdock": {"command": tool_cmd, "args": [session_id.as_str()]}
        }
    });
    std::fs::write(&path, config.to_string())
        .map_err(|e| DockError::Internal(format!("mcp config write: {e}")))?;
    Ok(path)
}

/// Build the spawn spec for one session's child.
///
/// The positional prompt stays empty: the first stdin frame carries the user
/// message, which keeps image attachments and later streaming input on one
/// uniform path.
pub fn build_spawn_spec(
    session: &Session,
    agent: &AgentCommand,
    mcp_config: Option<&PathBuf>,
) -> SpawnSpec {
    let mut args = agent.args_prefix.clone();
    args.extend([
        String::new(),
        "--input-format".into(),
        "stream-json".into(),
        "--output-format".into(),
        "stream-json".into(),
        "--verbose".into(),
    ]);
    if let Some(agent_session_id) = &session.agent_session_id {
        args.extend(["--resume".into(), agent_session_id.clone()]);
    }
    if let Some(mode) = &session.permission_mode {
        args.extend(["--permission-mode".into(), mode.clone()]);
    }
    if let Some(path) = mcp_config {
        args.extend([
            "--permission-prompt-tool".into(),
            PERMISSION_TOOL_NAME.into(),
            "--mcp-config".into(),
            path.display().to_string(),
        ]);
    }

    SpawnSpec {
        program: agent.program.clone(),
        args,
        cwd: session.working_dir.clone(),
        env: vec![],
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
