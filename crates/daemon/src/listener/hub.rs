// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection registry and event fan-out.
//!
//! The hub owns one bounded outbound queue per connection. Rolling output
//! (text/thinking) is dropped when a queue is full; structural events are
//! delivered with an awaited send so they are never lost silently. Broadcast
//! iteration snapshots the sender list, so concurrent register/unregister
//! never blocks delivery.

use crate::protocol::ServerEvent;
use dock_core::SessionId;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Gateway connection identifier.
pub type ConnId = u64;

/// Outbound queue depth per connection.
pub const CONN_QUEUE_DEPTH: usize = 256;

struct ConnEntry {
    tx: mpsc::Sender<ServerEvent>,
    attached: HashSet<SessionId>,
}

/// Shared connection registry.
#[derive(Default)]
pub struct Hub {
    conns: Mutex<HashMap<ConnId, ConnEntry>>,
    next_id: AtomicU64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection; returns its id. The paired receiver feeds the
    /// connection's write task.
    pub fn register(&self) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(CONN_QUEUE_DEPTH);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.conns.lock().insert(id, ConnEntry { tx, attached: HashSet::new() });
        debug!(conn = id, "connection registered");
        (id, rx)
    }

    pub fn unregister(&self, conn: ConnId) {
        self.conns.lock().remove(&conn);
        debug!(conn, "connection unregistered");
    }

    /// Declare interest in a session's events.
    pub fn attach(&self, conn: ConnId, session_id: SessionId) {
        if let Some(entry) = self.conns.lock().get_mut(&conn) {
            entry.attached.insert(session_id);
        }
    }

    pub fn detach(&self, conn: ConnId, session_id: SessionId) {
        if let Some(entry) = self.conns.lock().get_mut(&conn) {
            entry.attached.remove(&session_id);
        }
    }

    /// Drop a deleted session from every connection's attach set.
    pub fn detach_all(&self, session_id: SessionId) {
        for entry in self.conns.lock().values_mut() {
            entry.attached.remove(&session_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Deliver to one connection.
    pub async fn send_to(&self, conn: ConnId, event: ServerEvent) {
        let tx = self.conns.lock().get(&conn).map(|e| e.tx.clone());
        if let Some(tx) = tx {
            deliver(&tx, conn, event).await;
        }
    }

    /// Deliver to every connection attached to `session_id`, in arrival
    /// order per connection.
    pub async fn send_session(&self, session_id: SessionId, event: ServerEvent) {
        let targets: Vec<(ConnId, mpsc::Sender<ServerEvent>)> = self
            .conns
            .lock()
            .iter()
            .filter(|(_, e)| e.attached.contains(&session_id))
            .map(|(id, e)| (*id, e.tx.clone()))
            .collect();
        for (conn, tx) in targets {
            deliver(&tx, conn, event.clone()).await;
        }
    }

    /// Deliver to every connection.
    pub async fn broadcast(&self, event: ServerEvent) {
        let targets: Vec<(ConnId, mpsc::Sender<ServerEvent>)> =
            self.conns.lock().iter().map(|(id, e)| (*id, e.tx.clone())).collect();
        for (conn, tx) in targets {
            deliver(&tx, conn, event.clone()).await;
        }
    }
}

/// Queue one event, applying the back-pressure policy.
async fn deliver(tx: &mpsc::Sender<ServerEvent>, conn: ConnId, event: ServerEvent) {
    if event.is_droppable() {
        if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
            warn!(conn, event = event_name(&event), "outbound queue full, dropping rolling output");
        }
    } else {
        // Structural events are never dropped; a slow client stalls only its
        // own session's task, not the whole gateway.
        let _ = tx.send(event).await;
    }
}

fn event_name(event: &ServerEvent) -> &'static str {
    match event {
        ServerEvent::TextOutput { .. } => "text_output",
        ServerEvent::ThinkingOutput { .. } => "thinking_output",
        _ => "other",
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
