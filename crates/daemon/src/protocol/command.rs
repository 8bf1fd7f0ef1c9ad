// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use dock_core::{
    Attachment, PermissionDecision, RepoDescriptor, SessionId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Client → server commands.
///
/// The external permission service connects as an ordinary peer and issues
/// `permission_request`; interactive clients answer with
/// `permission_response` / `question_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    ListSessions,

    CreateSession {
        name: String,
        working_dir: String,
        /// When present, the working directory is materialized from this
        /// descriptor at first user message instead of used verbatim.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repo: Option<RepoDescriptor>,
    },

    AttachSession {
        session_id: SessionId,
    },

    DeleteSession {
        session_id: SessionId,
    },

    RenameSession {
        session_id: SessionId,
        name: String,
    },

    SetPermissionMode {
        session_id: SessionId,
        /// `ask`, `auto-edit`, `plan`, …
        mode: String,
    },

    SetModel {
        session_id: SessionId,
        model: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        old_model: Option<String>,
    },

    UserMessage {
        session_id: SessionId,
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<Attachment>,
    },

    Interrupt {
        session_id: SessionId,
    },

    CompactSession {
        session_id: SessionId,
    },

    /// From the permission service peer: a tool call awaits a verdict.
    PermissionRequest {
        session_id: SessionId,
        request_id: String,
        tool_name: String,
        input: serde_json::Value,
    },

    /// From an interactive client: the verdict, relayed verbatim upstream.
    PermissionResponse {
        session_id: SessionId,
        request_id: String,
        response: PermissionDecision,
    },

    /// From an interactive client: answers keyed by question header.
    QuestionResponse {
        session_id: SessionId,
        request_id: String,
        answers: BTreeMap<String, String>,
    },
}

impl ClientCommand {
    /// Session this command targets, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ClientCommand::ListSessions | ClientCommand::CreateSession { .. } => None,
            ClientCommand::AttachSession { session_id }
            | ClientCommand::DeleteSession { session_id }
            | ClientCommand::RenameSession { session_id, .. }
            | ClientCommand::SetPermissionMode { session_id, .. }
            | ClientCommand::SetModel { session_id, .. }
            | ClientCommand::UserMessage { session_id, .. }
            | ClientCommand::Interrupt { session_id }
            | ClientCommand::CompactSession { session_id }
            | ClientCommand::PermissionRequest { session_id, .. }
            | ClientCommand::PermissionResponse { session_id, .. }
            | ClientCommand::QuestionResponse { session_id, .. } => Some(*session_id),
        }
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
