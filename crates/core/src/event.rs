// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store events.
//!
//! Every persistent session mutation is expressed as a `StoreEvent`,
//! appended to the WAL and applied to the materialized state. Applying an
//! event must be idempotent: recovery may replay entries that were already
//! folded into a snapshot.
//!
//! Serializes with `{"type": "event:name", ...fields}` format. Unknown type
//! tags deserialize to `Custom`.

use crate::history::HistoryEntry;
use crate::id::SessionId;
use crate::repo::RepoDescriptor;
use crate::usage::Usage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    #[serde(rename = "session:created")]
    SessionCreated {
        id: SessionId,
        name: String,
        working_dir: PathBuf,
        created_at_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repo: Option<RepoDescriptor>,
    },

    #[serde(rename = "session:renamed")]
    SessionRenamed { id: SessionId, name: String },

    /// Workspace materialized; binds the final working-directory path.
    #[serde(rename = "session:workspace")]
    WorkspaceBound { id: SessionId, working_dir: PathBuf },

    #[serde(rename = "session:deleted")]
    SessionDeleted { id: SessionId },

    #[serde(rename = "session:history")]
    HistoryAppended { id: SessionId, entry: HistoryEntry },

    #[serde(rename = "session:usage")]
    UsageAdded {
        id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        sample: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context_window: Option<u64>,
        at_ms: u64,
    },

    #[serde(rename = "session:agent_id")]
    AgentSessionIdSet { id: SessionId, agent_session_id: String },

    #[serde(rename = "session:model")]
    ModelSet { id: SessionId, model: String },

    #[serde(rename = "session:permission_mode")]
    PermissionModeSet { id: SessionId, mode: String },

    /// Catch-all for unknown event types (forward compatibility)
    #[serde(other, skip_serializing)]
    Custom,
}

impl StoreEvent {
    /// Session this event belongs to, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            StoreEvent::SessionCreated { id, .. }
            | StoreEvent::SessionRenamed { id, .. }
            | StoreEvent::WorkspaceBound { id, .. }
            | StoreEvent::SessionDeleted { id }
            | StoreEvent::HistoryAppended { id, .. }
            | StoreEvent::UsageAdded { id, .. }
            | StoreEvent::AgentSessionIdSet { id, .. }
            | StoreEvent::ModelSet { id, .. }
            | StoreEvent::PermissionModeSet { id, .. } => Some(*id),
            StoreEvent::Custom => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
