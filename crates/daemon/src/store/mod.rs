// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable session store.
//!
//! WAL-first writes over a materialized in-memory state. All mutators for a
//! given session serialize behind one lock (single-writer semantics);
//! readers clone a consistent snapshot. Runtime-only fields (status, pending
//! prompts) are mutated through the same API but never hit the WAL.

mod state;

pub use state::{block_start, day_key, DockState, USAGE_BLOCK_MS};

use crate::protocol::{BlockUsage, DailyUsage};
use dock_core::{
    DockError, HistoryEntry, PendingPermission, PendingQuestion, RepoDescriptor, Session,
    SessionId, SessionStatus, StoreEvent, Usage,
};
use dock_storage::{load_snapshot, save_snapshot, Snapshot, Wal};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const WAL_FILE: &str = "dock.wal";
const SNAPSHOT_FILE: &str = "dock.snapshot";

struct Inner {
    wal: Wal,
    state: DockState,
}

/// Durable map of sessions plus the append-only history log.
pub struct SessionStore {
    inner: Mutex<Inner>,
    snapshot_path: PathBuf,
}

impl SessionStore {
    /// Open the store in `db_dir`, recovering from snapshot + WAL replay.
    ///
    /// Recovered sessions rehydrate with `status=idle` and cleared pending
    /// prompts: any previously-running child is gone and prompt waiters do
    /// not survive a restart.
    pub fn open(db_dir: &Path) -> Result<Self, DockError> {
        std::fs::create_dir_all(db_dir)
            .map_err(|e| DockError::Internal(format!("failed to create db dir: {e}")))?;
        let snapshot_path = db_dir.join(SNAPSHOT_FILE);

        let (mut state, snapshot_seq) =
            match load_snapshot::<DockState>(&snapshot_path) {
                Ok(Some(snapshot)) => (snapshot.state, snapshot.seq),
                Ok(None) => (DockState::default(), 0),
                Err(e) => {
                    warn!(%e, "snapshot unreadable, rebuilding state from WAL only");
                    (DockState::default(), 0)
                }
            };

        let mut wal = Wal::open(db_dir.join(WAL_FILE), snapshot_seq)
            .map_err(|e| DockError::Internal(format!("failed to open WAL: {e}")))?;

        let mut replayed = 0usize;
        while let Some(entry) =
            wal.next_unprocessed().map_err(|e| DockError::Internal(e.to_string()))?
        {
            state.apply_event(&entry.event);
            wal.mark_processed(entry.seq);
            replayed += 1;
        }

        for session in state.sessions.values_mut() {
            session.rehydrate();
        }

        info!(
            sessions = state.sessions.len(),
            replayed,
            snapshot_seq,
            "session store recovered"
        );
        Ok(Self { inner: Mutex::new(Inner { wal, state }), snapshot_path })
    }

    /// Append to the WAL (durable before return), then fold into state.
    fn commit(&self, event: StoreEvent) -> Result<(), DockError> {
        let mut inner = self.inner.lock();
        let seq = inner
            .wal
            .append(&event)
            .and_then(|seq| inner.wal.flush().map(|_| seq))
            .map_err(|e| DockError::Internal(format!("WAL append failed: {e}")))?;
        inner.state.apply_event(&event);
        inner.wal.mark_processed(seq);
        Ok(())
    }

    fn require(&self, id: SessionId) -> Result<(), DockError> {
        if self.inner.lock().state.sessions.contains_key(&id) {
            Ok(())
        } else {
            Err(DockError::unknown_session(id))
        }
    }

    /// Write a snapshot and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), DockError> {
        let mut inner = self.inner.lock();
        let seq = inner.wal.write_seq();
        let snapshot = Snapshot::new(seq, inner.state.clone());
        save_snapshot(&self.snapshot_path, &snapshot)
            .map_err(|e| DockError::Internal(format!("snapshot save failed: {e}")))?;
        inner
            .wal
            .truncate(seq)
            .map_err(|e| DockError::Internal(format!("WAL truncate failed: {e}")))?;
        Ok(())
    }

    // ---- durable mutators ----

    pub fn create(
        &self,
        name: impl Into<String>,
        working_dir: PathBuf,
        repo: Option<RepoDescriptor>,
        now_ms: u64,
    ) -> Result<Session, DockError> {
        let id = SessionId::new();
        let name = name.into();
        self.commit(StoreEvent::SessionCreated {
            id,
            name,
            working_dir,
            created_at_ms: now_ms,
            repo,
        })?;
        self.get(id).ok_or_else(|| DockError::Internal("created session vanished".into()))
    }

    pub fn rename(&self, id: SessionId, name: impl Into<String>) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::SessionRenamed { id, name: name.into() })
    }

    /// Remove the session record. Returns the final state of the removed
    /// session so the caller can run workspace cleanup.
    pub fn delete(&self, id: SessionId) -> Result<Session, DockError> {
        let session = self.get(id).ok_or_else(|| DockError::unknown_session(id))?;
        self.commit(StoreEvent::SessionDeleted { id })?;
        Ok(session)
    }

    pub fn append_history(&self, id: SessionId, entry: HistoryEntry) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::HistoryAppended { id, entry })
    }

    pub fn add_usage(
        &self,
        id: SessionId,
        model: Option<String>,
        sample: Usage,
        context_window: Option<u64>,
        at_ms: u64,
    ) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::UsageAdded { id, model, sample, context_window, at_ms })
    }

    pub fn set_agent_session_id(&self, id: SessionId, agent_id: String) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::AgentSessionIdSet { id, agent_session_id: agent_id })
    }

    pub fn set_model(&self, id: SessionId, model: String) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::ModelSet { id, model })
    }

    pub fn set_permission_mode(&self, id: SessionId, mode: String) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::PermissionModeSet { id, mode })
    }

    pub fn bind_workspace(&self, id: SessionId, working_dir: PathBuf) -> Result<(), DockError> {
        self.require(id)?;
        self.commit(StoreEvent::WorkspaceBound { id, working_dir })
    }

    // ---- runtime-only mutators (never persisted) ----

    pub fn set_status(&self, id: SessionId, status: SessionStatus) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.state.sessions.get_mut(&id) {
            session.status = status;
        }
    }

    pub fn set_pending_permission(&self, id: SessionId, pending: Option<PendingPermission>) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.state.sessions.get_mut(&id) {
            session.pending_permission = pending;
        }
    }

    pub fn set_pending_question(&self, id: SessionId, pending: Option<PendingQuestion>) {
        let mut inner = self.inner.lock();
        if let Some(session) = inner.state.sessions.get_mut(&id) {
            session.pending_question = pending;
        }
    }

    // ---- snapshot reads ----

    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.inner.lock().state.sessions.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<Session> {
        self.inner.lock().state.list().into_iter().cloned().collect()
    }

    /// Aggregated usage for the `global_usage` broadcast.
    pub fn usage_report(&self, now_ms: u64) -> (Usage, Usage, Vec<DailyUsage>, Vec<BlockUsage>) {
        let inner = self.inner.lock();
        let today_key = day_key(now_ms);
        let today = inner.state.daily.get(&today_key).copied().unwrap_or_default();
        let daily = inner
            .state
            .daily
            .iter()
            .map(|(date, usage)| DailyUsage { date: date.clone(), usage: *usage })
            .collect();
        let blocks = inner
            .state
            .blocks
            .iter()
            .map(|(start_ms, usage)| BlockUsage { start_ms: *start_ms, usage: *usage })
            .collect();
        (today, inner.state.totals, daily, blocks)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
