// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay.
//!
//! State is derived from store events: events are facts about what
//! happened; the maps below are a fold over them. The sequence discipline
//! (snapshot seq + replay of strictly-later entries, single writer at
//! runtime) guarantees each event is applied exactly once.

use dock_core::{Session, SessionId, StoreEvent, Usage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Length of a usage accounting block (five hours).
pub const USAGE_BLOCK_MS: u64 = 5 * 60 * 60 * 1000;

/// Materialized state built from store events.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct DockState {
    pub sessions: HashMap<SessionId, Session>,
    /// All-time token totals across sessions (survives session deletion).
    #[serde(default)]
    pub totals: Usage,
    /// Per-UTC-day aggregates, keyed `YYYY-MM-DD`.
    #[serde(default)]
    pub daily: BTreeMap<String, Usage>,
    /// Per-block aggregates, keyed by block start in epoch ms.
    #[serde(default)]
    pub blocks: BTreeMap<u64, Usage>,
}

/// UTC day key for a timestamp.
pub fn day_key(at_ms: u64) -> String {
    chrono::DateTime::from_timestamp_millis(at_ms as i64)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// Start of the accounting block containing `at_ms`.
pub fn block_start(at_ms: u64) -> u64 {
    at_ms - at_ms % USAGE_BLOCK_MS
}

impl DockState {
    /// Apply an event to derive state changes.
    pub fn apply_event(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::SessionCreated { id, name, working_dir, created_at_ms, repo } => {
                // Guarded insert keeps replay over a stale snapshot harmless.
                self.sessions.entry(*id).or_insert_with(|| {
                    let mut session =
                        Session::new(*id, name.clone(), working_dir.clone(), *created_at_ms);
                    session.repo = repo.clone();
                    session
                });
            }
            StoreEvent::SessionRenamed { id, name } => {
                self.with_session(id, |s| s.name = name.clone());
            }
            StoreEvent::WorkspaceBound { id, working_dir } => {
                self.with_session(id, |s| {
                    s.working_dir = working_dir.clone();
                    s.workspace_bound = true;
                });
            }
            StoreEvent::SessionDeleted { id } => {
                self.sessions.remove(id);
            }
            StoreEvent::HistoryAppended { id, entry } => {
                self.with_session(id, |s| s.history.push(entry.clone()));
            }
            StoreEvent::UsageAdded { id, model, sample, context_window, at_ms } => {
                self.with_session(id, |s| {
                    s.usage.add(sample);
                    if let Some(model) = model {
                        s.model_usage.entry(model.clone()).or_default().add(sample, *context_window);
                    }
                });
                self.totals.add(sample);
                self.daily.entry(day_key(*at_ms)).or_default().add(sample);
                self.blocks.entry(block_start(*at_ms)).or_default().add(sample);
            }
            StoreEvent::AgentSessionIdSet { id, agent_session_id } => {
                self.with_session(id, |s| s.agent_session_id = Some(agent_session_id.clone()));
            }
            StoreEvent::ModelSet { id, model } => {
                self.with_session(id, |s| s.model = Some(model.clone()));
            }
            StoreEvent::PermissionModeSet { id, mode } => {
                self.with_session(id, |s| s.permission_mode = Some(mode.clone()));
            }
            StoreEvent::Custom => {}
        }
    }

    fn with_session(&mut self, id: &SessionId, f: impl FnOnce(&mut Session)) {
        match self.sessions.get_mut(id) {
            Some(session) => f(session),
            None => warn!(%id, "event for unknown session ignored"),
        }
    }

    /// Sessions ordered by creation time descending, id ascending within
    /// ties (stable listing order).
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            b.created_at_ms.cmp(&a.created_at_ms).then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        sessions
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
