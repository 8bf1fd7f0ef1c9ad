// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission waiter correlation.
//!
//! Maps outstanding permission request ids to the gateway connection that
//! must be woken when a client answers (the external permission service
//! peer). Question prompts need no entry here: their waiter is the session
//! task itself and the pending record lives on the Session.

use crate::listener::ConnId;
use dock_core::SessionId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// The party to wake when a permission answer arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionWaiter {
    pub session_id: SessionId,
    pub conn: ConnId,
}

#[derive(Default)]
pub struct Broker {
    permission_waiters: Mutex<HashMap<String, PermissionWaiter>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the waiter for `request_id`. Returns `false` when the id is
    /// already outstanding (duplicate requests are rejected).
    pub fn register(&self, request_id: &str, session_id: SessionId, conn: ConnId) -> bool {
        let mut waiters = self.permission_waiters.lock();
        if waiters.contains_key(request_id) {
            return false;
        }
        waiters.insert(request_id.to_string(), PermissionWaiter { session_id, conn });
        true
    }

    /// Resolve and remove the waiter for `request_id`, verifying it belongs
    /// to `session_id`. A mismatched session leaves the entry in place.
    pub fn take(&self, request_id: &str, session_id: SessionId) -> Option<PermissionWaiter> {
        let mut waiters = self.permission_waiters.lock();
        match waiters.get(request_id) {
            Some(w) if w.session_id == session_id => waiters.remove(request_id),
            _ => None,
        }
    }

    /// Drop all waiters registered by a dead connection. Returns what was
    /// cancelled so the sessions can clear their pending records.
    pub fn cancel_conn(&self, conn: ConnId) -> Vec<(String, SessionId)> {
        let mut waiters = self.permission_waiters.lock();
        let cancelled: Vec<(String, SessionId)> = waiters
            .iter()
            .filter(|(_, w)| w.conn == conn)
            .map(|(id, w)| (id.clone(), w.session_id))
            .collect();
        for (id, _) in &cancelled {
            waiters.remove(id);
        }
        cancelled
    }

    /// Drop all waiters for a deleted session. Returns the connections that
    /// were waiting so they can be told the request was cancelled.
    pub fn cancel_session(&self, session_id: SessionId) -> Vec<(String, ConnId)> {
        let mut waiters = self.permission_waiters.lock();
        let cancelled: Vec<(String, ConnId)> = waiters
            .iter()
            .filter(|(_, w)| w.session_id == session_id)
            .map(|(id, w)| (id.clone(), w.conn))
            .collect();
        for (id, _) in &cancelled {
            waiters.remove(id);
        }
        cancelled
    }

    pub fn outstanding(&self) -> usize {
        self.permission_waiters.lock().len()
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
