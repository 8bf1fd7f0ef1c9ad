// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Session record and its runtime status.

use crate::history::HistoryEntry;
use crate::id::SessionId;
use crate::question::QuestionEntry;
use crate::repo::RepoDescriptor;
use crate::usage::{ModelUsage, Usage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Session status.
///
/// Invariants maintained by the orchestrator:
/// - `Running` iff a supervised child is attached and no prompt is pending.
/// - `WaitingPermission` iff `pending_permission` is set.
/// - `WaitingInput` iff `pending_question` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Running,
    WaitingPermission,
    WaitingInput,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::WaitingPermission => "waiting_permission",
            SessionStatus::WaitingInput => "waiting_input",
        }
    }
}

/// An outstanding permission request, kept on the Session so reconnecting
/// clients can restore the modal prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPermission {
    pub request_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    /// Gateway connection id of the upstream waiter (the permission service
    /// peer). Not meaningful across restarts.
    #[serde(default, skip_serializing)]
    pub waiter: u64,
}

/// An outstanding AskUserQuestion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub request_id: String,
    pub questions: Vec<QuestionEntry>,
}

/// A client's verdict on a permission request, relayed verbatim upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub behavior: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "updatedInput")]
    pub updated_input: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One conversation thread with its own agent child, workspace, and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub created_at_ms: u64,
    pub working_dir: PathBuf,

    /// Repository descriptor, when the working directory is provisioned
    /// rather than used verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<RepoDescriptor>,

    /// Whether the workspace has been materialized. Once bound, the
    /// working-directory path never changes.
    #[serde(default)]
    pub workspace_bound: bool,

    /// Agent-assigned session id, captured the first time the agent reports
    /// one and replaced if a later `result` rotates it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    /// Runtime-only: rehydrated to Idle on startup.
    #[serde(default)]
    pub status: SessionStatus,

    /// Runtime-only: cleared on startup (waiters do not survive restarts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_permission: Option<PendingPermission>,

    /// Runtime-only: cleared on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_question: Option<PendingQuestion>,

    #[serde(default)]
    pub usage: Usage,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_usage: BTreeMap<String, ModelUsage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(
        id: SessionId,
        name: impl Into<String>,
        working_dir: PathBuf,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            created_at_ms,
            working_dir,
            repo: None,
            workspace_bound: false,
            agent_session_id: None,
            model: None,
            permission_mode: None,
            status: SessionStatus::Idle,
            pending_permission: None,
            pending_question: None,
            usage: Usage::default(),
            model_usage: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// True when a prompt (permission or question) is outstanding.
    pub fn has_pending_prompt(&self) -> bool {
        self.pending_permission.is_some() || self.pending_question.is_some()
    }

    /// Reset runtime-only fields after restart: any previously-running child
    /// is gone and prompt waiters do not survive.
    pub fn rehydrate(&mut self) {
        self.status = SessionStatus::Idle;
        self.pending_permission = None;
        self.pending_question = None;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
