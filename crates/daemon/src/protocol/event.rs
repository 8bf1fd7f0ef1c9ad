// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use dock_core::{
    ErrorKind, HistoryEntry, ModelUsage, PendingPermission, PendingQuestion, PermissionDecision,
    QuestionEntry, Session, SessionId, SessionStatus, Usage,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Session summary for `session_list` / `session_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub name: String,
    pub created_at_ms: u64,
    pub working_dir: PathBuf,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,
    pub usage: Usage,
}

impl From<&Session> for SessionInfo {
    fn from(s: &Session) -> Self {
        Self {
            session_id: s.id,
            name: s.name.clone(),
            created_at_ms: s.created_at_ms,
            working_dir: s.working_dir.clone(),
            status: s.status,
            model: s.model.clone(),
            permission_mode: s.permission_mode.clone(),
            usage: s.usage,
        }
    }
}

/// One day of aggregated usage in a `global_usage` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyUsage {
    /// `YYYY-MM-DD` (UTC)
    pub date: String,
    pub usage: Usage,
}

/// One five-hour accounting block in a `global_usage` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockUsage {
    pub start_ms: u64,
    pub usage: Usage,
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    SessionList {
        sessions: Vec<SessionInfo>,
    },

    SessionCreated {
        session_id: SessionId,
        session: SessionInfo,
    },

    /// Attach snapshot: everything a reconnecting client needs to re-render,
    /// including any modal prompt still outstanding.
    SessionAttached {
        session_id: SessionId,
        history: Vec<HistoryEntry>,
        status: SessionStatus,
        is_running: bool,
        usage: Usage,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        model_usage: BTreeMap<String, ModelUsage>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_permission: Option<PendingPermission>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_question: Option<PendingQuestion>,
    },

    SessionDeleted {
        session_id: SessionId,
    },

    SessionStatusChanged {
        session_id: SessionId,
        status: SessionStatus,
    },

    TextOutput {
        session_id: SessionId,
        text: String,
    },

    ThinkingOutput {
        session_id: SessionId,
        thinking: String,
    },

    ToolUse {
        session_id: SessionId,
        tool_name: String,
        tool_use_id: String,
        input: serde_json::Value,
    },

    ToolResult {
        session_id: SessionId,
        tool_use_id: String,
        content: serde_json::Value,
        is_error: bool,
    },

    AskUserQuestion {
        session_id: SessionId,
        request_id: String,
        questions: Vec<QuestionEntry>,
    },

    PermissionRequest {
        session_id: SessionId,
        request_id: String,
        tool_name: String,
        input: serde_json::Value,
    },

    /// Relayed verbatim to the permission-service peer that issued the
    /// matching `permission_request`.
    PermissionResponse {
        session_id: SessionId,
        request_id: String,
        response: PermissionDecision,
    },

    Result {
        session_id: SessionId,
        result: String,
    },

    SystemInfo {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permission_mode: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tools: Vec<String>,
    },

    UsageInfo {
        session_id: SessionId,
        usage: Usage,
    },

    SystemMessage {
        session_id: SessionId,
        content: String,
    },

    GlobalUsage {
        today: Usage,
        totals: Usage,
        daily: Vec<DailyUsage>,
        blocks: Vec<BlockUsage>,
    },

    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        kind: ErrorKind,
        message: String,
    },
}

impl ServerEvent {
    /// Session this event is scoped to; `None` means global broadcast.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ServerEvent::SessionList { .. } | ServerEvent::GlobalUsage { .. } => None,
            ServerEvent::Error { session_id, .. } => *session_id,
            ServerEvent::SessionCreated { session_id, .. }
            | ServerEvent::SessionAttached { session_id, .. }
            | ServerEvent::SessionDeleted { session_id }
            | ServerEvent::SessionStatusChanged { session_id, .. }
            | ServerEvent::TextOutput { session_id, .. }
            | ServerEvent::ThinkingOutput { session_id, .. }
            | ServerEvent::ToolUse { session_id, .. }
            | ServerEvent::ToolResult { session_id, .. }
            | ServerEvent::AskUserQuestion { session_id, .. }
            | ServerEvent::PermissionRequest { session_id, .. }
            | ServerEvent::PermissionResponse { session_id, .. }
            | ServerEvent::Result { session_id, .. }
            | ServerEvent::SystemInfo { session_id, .. }
            | ServerEvent::UsageInfo { session_id, .. }
            | ServerEvent::SystemMessage { session_id, .. } => Some(*session_id),
        }
    }

    /// Whether this event may be dropped under back-pressure.
    ///
    /// Only rolling output is droppable; structural events (status, result,
    /// prompts) are always delivered.
    pub fn is_droppable(&self) -> bool {
        matches!(self, ServerEvent::TextOutput { .. } | ServerEvent::ThinkingOutput { .. })
    }

    pub fn error(session_id: Option<SessionId>, err: &dock_core::DockError) -> Self {
        ServerEvent::Error { session_id, kind: err.kind(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
