// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session engine.
//!
//! Routes gateway commands to per-session tasks, answers snapshot queries
//! (list/attach) straight from the store, and correlates permission
//! responses through the broker. Commands are cheap to route; everything
//! slow happens inside the owning session task.

mod broker;
mod session_task;
mod spawn;

pub use broker::{Broker, PermissionWaiter};
pub use session_task::SessionCommand;
pub use spawn::{build_spawn_spec, mcp_config_path, write_mcp_config, AgentCommand};

use crate::agent::AgentLauncher;
use crate::listener::{ConnId, Hub};
use crate::protocol::{ClientCommand, ServerEvent, SessionInfo};
use crate::store::SessionStore;
use crate::workspace::Workspaces;
use dock_core::{Clock, DockError, Session, SessionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Shared dependencies handed to every session task.
pub struct EngineDeps {
    pub store: Arc<SessionStore>,
    pub hub: Arc<Hub>,
    pub broker: Arc<Broker>,
    pub workspaces: Workspaces,
    pub launcher: Arc<dyn AgentLauncher>,
    pub agent: AgentCommand,
}

type SessionMap = Arc<Mutex<HashMap<SessionId, mpsc::Sender<SessionCommand>>>>;

pub struct Engine<C: Clock> {
    deps: Arc<EngineDeps>,
    clock: C,
    sessions: SessionMap,
}

impl<C: Clock> Engine<C> {
    pub fn new(deps: EngineDeps, clock: C) -> Arc<Self> {
        Arc::new(Self {
            deps: Arc::new(deps),
            clock,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.deps.store
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.deps.hub
    }

    /// Handle one inbound command. Fast: anything slow is queued onto the
    /// owning session task so one session cannot starve others.
    pub async fn handle_command(&self, conn: ConnId, cmd: ClientCommand) {
        match cmd {
            ClientCommand::ListSessions => {
                let sessions =
                    self.deps.store.list().iter().map(SessionInfo::from).collect();
                self.deps.hub.send_to(conn, ServerEvent::SessionList { sessions }).await;
            }
            ClientCommand::CreateSession { name, working_dir, repo } => {
                match self.deps.store.create(
                    name,
                    std::path::PathBuf::from(working_dir),
                    repo,
                    self.clock.epoch_ms(),
                ) {
                    Ok(session) => {
                        info!(id = %session.id, name = %session.name, "session created");
                        // The creator observes its new session immediately.
                        self.deps.hub.attach(conn, session.id);
                        self.deps
                            .hub
                            .broadcast(ServerEvent::SessionCreated {
                                session_id: session.id,
                                session: SessionInfo::from(&session),
                            })
                            .await;
                    }
                    Err(e) => {
                        self.deps.hub.send_to(conn, ServerEvent::error(None, &e)).await;
                    }
                }
            }
            ClientCommand::AttachSession { session_id } => match self.deps.store.get(session_id) {
                Some(session) => {
                    self.deps.hub.attach(conn, session_id);
                    self.deps.hub.send_to(conn, attached_snapshot(&session)).await;
                }
                None => {
                    let err = DockError::unknown_session(session_id);
                    self.deps.hub.send_to(conn, ServerEvent::error(Some(session_id), &err)).await;
                }
            },
            ClientCommand::DeleteSession { session_id } => {
                self.delete_session(conn, session_id).await;
            }
            ClientCommand::RenameSession { session_id, name } => {
                match self.deps.store.rename(session_id, name) {
                    Ok(()) => {
                        let sessions =
                            self.deps.store.list().iter().map(SessionInfo::from).collect();
                        self.deps.hub.broadcast(ServerEvent::SessionList { sessions }).await;
                    }
                    Err(e) => {
                        self.deps
                            .hub
                            .send_to(conn, ServerEvent::error(Some(session_id), &e))
                            .await;
                    }
                }
            }
            ClientCommand::UserMessage { session_id, content, images } => {
                self.route(conn, session_id, SessionCommand::UserMessage {
                    from: Some(conn),
                    text: content,
                    images,
                })
                .await;
            }
            ClientCommand::Interrupt { session_id } => {
                self.route(conn, session_id, SessionCommand::Interrupt { from: Some(conn) }).await;
            }
            ClientCommand::CompactSession { session_id } => {
                self.route(conn, session_id, SessionCommand::Compact { from: Some(conn) }).await;
            }
            ClientCommand::SetModel { session_id, model, old_model } => {
                self.route(conn, session_id, SessionCommand::SetModel {
                    from: Some(conn),
                    model,
                    old_model,
                })
                .await;
            }
            ClientCommand::SetPermissionMode { session_id, mode } => {
                self.route(conn, session_id, SessionCommand::SetPermissionMode {
                    from: Some(conn),
                    mode,
                })
                .await;
            }
            ClientCommand::PermissionRequest { session_id, request_id, tool_name, input } => {
                self.route(conn, session_id, SessionCommand::PermissionRequest {
                    from: conn,
                    request_id,
                    tool_name,
                    input,
                })
                .await;
            }
            ClientCommand::PermissionResponse { session_id, request_id, response } => {
                // Correlate through the broker; a missing or already-resolved
                // waiter must not disturb session state.
                match self.deps.broker.take(&request_id, session_id) {
                    Some(waiter) => {
                        self.deps
                            .hub
                            .send_to(
                                waiter.conn,
                                ServerEvent::PermissionResponse {
                                    session_id,
                                    request_id: request_id.clone(),
                                    response,
                                },
                            )
                            .await;
                        self.route(conn, session_id, SessionCommand::PermissionResolved {
                            request_id,
                        })
                        .await;
                    }
                    None => {
                        let err =
                            DockError::NotFound(format!("unknown permission request: {request_id}"));
                        self.deps
                            .hub
                            .send_to(conn, ServerEvent::error(Some(session_id), &err))
                            .await;
                    }
                }
            }
            ClientCommand::QuestionResponse { session_id, request_id, answers } => {
                self.route(conn, session_id, SessionCommand::QuestionAnswer {
                    from: conn,
                    request_id,
                    answers,
                })
                .await;
            }
        }
    }

    /// A connection died: release its permission waiters by cancellation.
    pub async fn handle_disconnect(&self, conn: ConnId) {
        self.deps.hub.unregister(conn);
        for (request_id, session_id) in self.deps.broker.cancel_conn(conn) {
            warn!(conn, %request_id, %session_id, "permission waiter cancelled by disconnect");
            if let Some(tx) = self.session_sender(session_id) {
                let _ = tx.send(SessionCommand::PermissionCancelled { request_id }).await;
            }
        }
    }

    /// Terminate all children and checkpoint the store.
    pub async fn shutdown(&self) {
        let senders: Vec<mpsc::Sender<SessionCommand>> =
            self.sessions.lock().values().cloned().collect();
        for tx in senders {
            let _ = tx.send(SessionCommand::Shutdown).await;
        }
        if let Err(e) = self.deps.store.checkpoint() {
            warn!(%e, "final checkpoint failed");
        }
    }

    async fn delete_session(&self, conn: ConnId, session_id: SessionId) {
        let Some(tx) = self.session_sender(session_id) else {
            let err = DockError::unknown_session(session_id);
            self.deps.hub.send_to(conn, ServerEvent::error(Some(session_id), &err)).await;
            return;
        };
        // Teardown can take a while (worktree removal); don't hold up the
        // caller's read loop.
        let deps = Arc::clone(&self.deps);
        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(SessionCommand::Delete { done: done_tx }).await.is_err() {
                return;
            }
            match done_rx.await {
                Ok(Ok(())) => {
                    sessions.lock().remove(&session_id);
                    deps.hub.detach_all(session_id);
                    deps.hub.broadcast(ServerEvent::SessionDeleted { session_id }).await;
                }
                Ok(Err(e)) => {
                    deps.hub.send_to(conn, ServerEvent::error(Some(session_id), &e)).await;
                }
                Err(_) => {}
            }
        });
    }

    /// Queue a command onto the owning session task, spawning the task
    /// lazily (sessions recovered from disk get a task at first use).
    async fn route(&self, conn: ConnId, session_id: SessionId, cmd: SessionCommand) {
        match self.session_sender(session_id) {
            Some(tx) => {
                if tx.send(cmd).await.is_err() {
                    warn!(%session_id, "session task queue closed");
                }
            }
            None => {
                let err = DockError::unknown_session(session_id);
                self.deps.hub.send_to(conn, ServerEvent::error(Some(session_id), &err)).await;
            }
        }
    }

    fn session_sender(&self, session_id: SessionId) -> Option<mpsc::Sender<SessionCommand>> {
        let mut sessions = self.sessions.lock();
        if let Some(tx) = sessions.get(&session_id) {
            return Some(tx.clone());
        }
        // Only spawn for sessions that exist in the store.
        self.deps.store.get(session_id)?;
        let tx = session_task::spawn(session_id, Arc::clone(&self.deps), self.clock.clone());
        sessions.insert(session_id, tx.clone());
        Some(tx)
    }
}

/// Build the attach-replay snapshot for a session.
fn attached_snapshot(session: &Session) -> ServerEvent {
    ServerEvent::SessionAttached {
        session_id: session.id,
        history: session.history.clone(),
        status: session.status,
        is_running: session.status != dock_core::SessionStatus::Idle,
        usage: session.usage,
        model_usage: session.model_usage.clone(),
        pending_permission: session.pending_permission.clone(),
        pending_question: session.pending_question.clone(),
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
