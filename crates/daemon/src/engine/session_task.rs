// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session orchestration task.
//!
//! One tokio task per session owns that session's child handle and turn
//! accumulator and consumes a single command queue: client commands routed
//! by the engine and decoded agent events pumped in by the supervisor. This
//! queue is the per-session single-writer; nothing else mutates a live
//! session.

use crate::agent::{AgentEvent, OutboundFrame};
use crate::engine::spawn::{build_spawn_spec, write_mcp_config};
use crate::engine::EngineDeps;
use crate::listener::ConnId;
use crate::protocol::ServerEvent;
use crate::workspace::CleanupHandle;
use dock_core::{
    Attachment, Clock, DockError, HistoryEntry, PendingPermission, PendingQuestion,
    QuestionAnswer, QuestionEntry, Session, SessionId, SessionStatus,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Prompt injected by `compact_session`.
const COMPACT_PROMPT: &str =
    "Summarize the conversation so far into a compact form, keeping all important context.";

/// Queue depth for a session's command channel.
const SESSION_QUEUE_DEPTH: usize = 256;

/// Commands consumed by a session task.
pub enum SessionCommand {
    UserMessage { from: Option<ConnId>, text: String, images: Vec<Attachment> },
    Compact { from: Option<ConnId> },
    Interrupt { from: Option<ConnId> },
    SetModel { from: Option<ConnId>, model: String, old_model: Option<String> },
    SetPermissionMode { from: Option<ConnId>, mode: String },
    PermissionRequest { from: ConnId, request_id: String, tool_name: String, input: serde_json::Value },
    /// Broker relayed the verbatim response; clear pending and resume.
    PermissionResolved { request_id: String },
    /// The waiting connection died before an answer arrived.
    PermissionCancelled { request_id: String },
    QuestionAnswer { from: ConnId, request_id: String, answers: BTreeMap<String, String> },
    Agent(AgentEvent),
    Delete { done: oneshot::Sender<Result<(), DockError>> },
    Shutdown,
}

/// Rolling buffers for the current turn, flushed to history on `result` or
/// exit.
#[derive(Default)]
struct Turn {
    text: String,
    thinking: String,
}

/// An in-flight `set_permission_mode` control request, kept so the optimistic
/// mode can be corrected when the control response arrives.
struct ModeChange {
    request_id: String,
    previous: Option<String>,
}

enum Flow {
    Continue,
    Stop,
}

pub(crate) struct SessionTask<C: Clock> {
    id: SessionId,
    deps: Arc<EngineDeps>,
    clock: C,
    cmd_tx: mpsc::Sender<SessionCommand>,
    cmd_rx: mpsc::Receiver<SessionCommand>,
    child: Option<Box<dyn crate::agent::AgentChild>>,
    turn: Option<Turn>,
    cleanup: Option<CleanupHandle>,
    mcp_config: Option<PathBuf>,
    mode_change: Option<ModeChange>,
}

/// Spawn the task for a session; the returned sender is its command queue.
pub(crate) fn spawn<C: Clock>(
    id: SessionId,
    deps: Arc<EngineDeps>,
    clock: C,
) -> mpsc::Sender<SessionCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
    let task = SessionTask {
        id,
        deps,
        clock,
        cmd_tx: cmd_tx.clone(),
        cmd_rx,
        child: None,
        turn: None,
        cleanup: None,
        mcp_config: None,
        mode_change: None,
    };
    tokio::spawn(task.run());
    cmd_tx
}

impl<C: Clock> SessionTask<C> {
    async fn run(mut self) {
        debug!(id = %self.id, "session task started");
        while let Some(cmd) = self.cmd_rx.recv().await {
            if matches!(self.handle(cmd).await, Flow::Stop) {
                break;
            }
        }
        debug!(id = %self.id, "session task stopped");
    }

    async fn handle(&mut self, cmd: SessionCommand) -> Flow {
        match cmd {
            SessionCommand::UserMessage { from, text, images } => {
                self.user_message(from, text, images).await;
            }
            SessionCommand::Compact { from } => self.compact(from).await,
            SessionCommand::Interrupt { from } => self.interrupt(from),
            SessionCommand::SetModel { from, model, old_model } => {
                self.set_model(from, model, old_model).await;
            }
            SessionCommand::SetPermissionMode { from, mode } => {
                self.set_permission_mode(from, mode).await;
            }
            SessionCommand::PermissionRequest { from, request_id, tool_name, input } => {
                self.permission_request(from, request_id, tool_name, input).await;
            }
            SessionCommand::PermissionResolved { request_id } => {
                self.permission_resolved(request_id).await;
            }
            SessionCommand::PermissionCancelled { request_id } => {
                self.permission_cancelled(request_id).await;
            }
            SessionCommand::QuestionAnswer { from, request_id, answers } => {
                self.question_answer(from, request_id, answers).await;
            }
            SessionCommand::Agent(event) => self.agent_event(event).await,
            SessionCommand::Delete { done } => {
                let result = self.delete().await;
                let _ = done.send(result);
                return Flow::Stop;
            }
            SessionCommand::Shutdown => {
                if let Some(child) = &self.child {
                    child.terminate();
                }
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    // ---- helpers ----

    fn session(&self) -> Option<Session> {
        self.deps.store.get(self.id)
    }

    async fn report(&self, from: Option<ConnId>, err: &DockError) {
        let event = ServerEvent::error(Some(self.id), err);
        match from {
            Some(conn) => self.deps.hub.send_to(conn, event).await,
            None => self.deps.hub.send_session(self.id, event).await,
        }
    }

    /// Set the status and broadcast the transition. Always broadcast after
    /// the transition's cause event so attached clients never observe a
    /// stale pending prompt alongside the new status.
    async fn set_status(&self, status: SessionStatus) {
        self.deps.store.set_status(self.id, status);
        self.deps
            .hub
            .broadcast(ServerEvent::SessionStatusChanged { session_id: self.id, status })
            .await;
    }

    fn append_history(&self, entry: HistoryEntry) {
        if let Err(e) = self.deps.store.append_history(self.id, entry) {
            warn!(id = %self.id, %e, "history append failed");
        }
    }

    async fn write_frame(&self, frame: OutboundFrame) -> Result<(), DockError> {
        match &self.child {
            Some(child) => child.write_frame(&frame).await,
            None => Err(DockError::Internal("no agent child attached".into())),
        }
    }

    // ---- user input ----

    async fn user_message(&mut self, from: Option<ConnId>, text: String, images: Vec<Attachment>) {
        let Some(session) = self.session() else {
            self.report(from, &DockError::unknown_session(self.id)).await;
            return;
        };
        match session.status {
            SessionStatus::Idle => self.start_turn(from, session, text, images).await,
            SessionStatus::Running => {
                // Mid-turn streaming input: an additional user frame.
                self.append_history(HistoryEntry::User {
                    at_ms: self.clock.epoch_ms(),
                    text: text.clone(),
                    images: images.clone(),
                });
                if let Err(e) = self.write_frame(OutboundFrame::User { text, images }).await {
                    self.report(from, &e).await;
                }
            }
            SessionStatus::WaitingPermission | SessionStatus::WaitingInput => {
                self.report(from, &DockError::Busy("session is waiting for a prompt answer".into()))
                    .await;
            }
        }
    }

    async fn compact(&mut self, from: Option<ConnId>) {
        let Some(session) = self.session() else {
            self.report(from, &DockError::unknown_session(self.id)).await;
            return;
        };
        if session.status != SessionStatus::Idle {
            self.report(from, &DockError::Busy("compact requires an idle session".into())).await;
            return;
        }
        self.start_turn(from, session, COMPACT_PROMPT.to_string(), vec![]).await;
    }

    /// Begin a turn from idle: record the user entry, provision the
    /// workspace on first use, spawn (or reuse) the child, and write the
    /// user frame. A child left alive after its last `result` keeps its
    /// stdin open and simply receives another turn.
    async fn start_turn(
        &mut self,
        from: Option<ConnId>,
        mut session: Session,
        text: String,
        images: Vec<Attachment>,
    ) {
        let now = self.clock.epoch_ms();
        self.append_history(HistoryEntry::User { at_ms: now, text: text.clone(), images: images.clone() });

        if self.child.is_none() {
            if let Some(repo) = session.repo.clone() {
                if !session.workspace_bound {
                    match self.deps.workspaces.provision(&repo, self.id).await {
                        Ok(provisioned) => {
                            if let Err(e) =
                                self.deps.store.bind_workspace(self.id, provisioned.path.clone())
                            {
                                self.report(from, &e).await;
                                return;
                            }
                            session.working_dir = provisioned.path;
                            session.workspace_bound = true;
                            self.cleanup = provisioned.cleanup;
                        }
                        Err(e) => {
                            self.report(from, &e).await;
                            return;
                        }
                    }
                }
            }

            let mcp_config = match &self.deps.agent.permission_tool_cmd {
                Some(cmd) => match write_mcp_config(self.id, cmd) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(id = %self.id, %e, "mcp config write failed, permission tool disabled");
                        None
                    }
                },
                None => None,
            };

            let (agent_tx, mut agent_rx) = mpsc::channel(SESSION_QUEUE_DEPTH);
            let spec = build_spawn_spec(&session, &self.deps.agent, mcp_config.as_ref());
            let child = match self.deps.launcher.launch(spec, agent_tx).await {
                Ok(child) => child,
                Err(e) => {
                    self.report(from, &e).await;
                    return;
                }
            };
            info!(id = %self.id, pid = ?child.pid(), "agent child spawned");

            // Pump decoded agent events into this task's command queue.
            let cmd_tx = self.cmd_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = agent_rx.recv().await {
                    if cmd_tx.send(SessionCommand::Agent(event)).await.is_err() {
                        break;
                    }
                }
            });

            self.child = Some(child);
            self.mcp_config = mcp_config;
        }

        self.turn = Some(Turn::default());
        self.set_status(SessionStatus::Running).await;

        if let Err(e) = self.write_frame(OutboundFrame::User { text, images }).await {
            self.report(from, &e).await;
        }
    }

    fn interrupt(&self, _from: Option<ConnId>) {
        match &self.child {
            Some(child) => child.signal_interrupt(),
            // Nothing to interrupt; treated as a no-op rather than an error.
            None => debug!(id = %self.id, "interrupt with no child"),
        }
    }

    // ---- control changes ----

    async fn set_model(&mut self, from: Option<ConnId>, model: String, old_model: Option<String>) {
        let Some(session) = self.session() else {
            self.report(from, &DockError::unknown_session(self.id)).await;
            return;
        };
        if session.has_pending_prompt() {
            self.report(from, &DockError::Busy("cannot change model while a prompt is pending".into()))
                .await;
            return;
        }
        let old = old_model.or(session.model).unwrap_or_else(|| "default".to_string());
        if let Err(e) = self.deps.store.set_model(self.id, model.clone()) {
            self.report(from, &e).await;
            return;
        }
        self.append_history(HistoryEntry::System {
            at_ms: self.clock.epoch_ms(),
            text: format!("{old} → {model}"),
        });
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::SystemInfo {
                    session_id: self.id,
                    model: Some(model),
                    permission_mode: None,
                    cwd: None,
                    tools: vec![],
                },
            )
            .await;
    }

    async fn set_permission_mode(&mut self, from: Option<ConnId>, mode: String) {
        let Some(session) = self.session() else {
            self.report(from, &DockError::unknown_session(self.id)).await;
            return;
        };
        if session.has_pending_prompt() {
            self.report(from, &DockError::Busy("cannot change mode while a prompt is pending".into()))
                .await;
            return;
        }
        let previous = session.permission_mode.clone();
        if let Err(e) = self.deps.store.set_permission_mode(self.id, mode.clone()) {
            self.report(from, &e).await;
            return;
        }
        // Applied optimistically; corrected if the control response reports
        // an error. Without a child the mode takes effect at next spawn.
        if self.child.is_some() {
            let request_id = format!("ctl-{}", uuid::Uuid::new_v4().simple());
            let frame =
                OutboundFrame::SetPermissionMode { request_id: request_id.clone(), mode: mode.clone() };
            match self.write_frame(frame).await {
                Ok(()) => self.mode_change = Some(ModeChange { request_id, previous }),
                Err(e) => {
                    self.report(from, &e).await;
                    return;
                }
            }
        }
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::SystemInfo {
                    session_id: self.id,
                    model: None,
                    permission_mode: Some(mode),
                    cwd: None,
                    tools: vec![],
                },
            )
            .await;
    }

    // ---- permission round-trip ----

    async fn permission_request(
        &mut self,
        from: ConnId,
        request_id: String,
        tool_name: String,
        input: serde_json::Value,
    ) {
        let Some(session) = self.session() else {
            self.report(Some(from), &DockError::unknown_session(self.id)).await;
            return;
        };
        if session.status != SessionStatus::Running || session.has_pending_prompt() {
            self.report(
                Some(from),
                &DockError::Busy("a prompt is already outstanding for this session".into()),
            )
            .await;
            return;
        }
        if !self.deps.broker.register(&request_id, self.id, from) {
            self.report(Some(from), &DockError::Busy(format!("duplicate request id: {request_id}")))
                .await;
            return;
        }
        self.deps.store.set_pending_permission(
            self.id,
            Some(PendingPermission {
                request_id: request_id.clone(),
                tool_name: tool_name.clone(),
                input: input.clone(),
                waiter: from,
            }),
        );
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::PermissionRequest { session_id: self.id, request_id, tool_name, input },
            )
            .await;
        self.set_status(SessionStatus::WaitingPermission).await;
    }

    async fn permission_resolved(&mut self, request_id: String) {
        let Some(session) = self.session() else { return };
        match &session.pending_permission {
            Some(pending) if pending.request_id == request_id => {
                self.deps.store.set_pending_permission(self.id, None);
                self.set_status(SessionStatus::Running).await;
            }
            _ => debug!(id = %self.id, %request_id, "stale permission resolution ignored"),
        }
    }

    async fn permission_cancelled(&mut self, request_id: String) {
        let Some(session) = self.session() else { return };
        match &session.pending_permission {
            Some(pending) if pending.request_id == request_id => {
                self.deps.store.set_pending_permission(self.id, None);
                self.deps
                    .hub
                    .send_session(self.id, ServerEvent::error(Some(self.id), &DockError::Cancelled))
                    .await;
                self.set_status(SessionStatus::Running).await;
            }
            _ => {}
        }
    }

    // ---- question round-trip ----

    /// An AskUserQuestion tool call is a question turn, not a tool
    /// invocation: park the turn until a client answers.
    async fn question_prompt(&mut self, request_id: String, input: serde_json::Value) {
        let Some(session) = self.session() else { return };
        if session.has_pending_prompt() {
            warn!(id = %self.id, "question while a prompt is already pending, ignoring");
            return;
        }
        let questions: Vec<QuestionEntry> = input
            .get("questions")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        self.append_history(HistoryEntry::Question {
            at_ms: self.clock.epoch_ms(),
            request_id: request_id.clone(),
            questions: questions.clone(),
        });
        self.deps.store.set_pending_question(
            self.id,
            Some(PendingQuestion { request_id: request_id.clone(), questions: questions.clone() }),
        );
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::AskUserQuestion { session_id: self.id, request_id, questions },
            )
            .await;
        self.set_status(SessionStatus::WaitingInput).await;
    }

    async fn question_answer(
        &mut self,
        from: ConnId,
        request_id: String,
        answers: BTreeMap<String, String>,
    ) {
        let Some(session) = self.session() else {
            self.report(Some(from), &DockError::unknown_session(self.id)).await;
            return;
        };
        let Some(pending) = session.pending_question else {
            self.report(Some(from), &DockError::NotFound(format!("no pending question: {request_id}")))
                .await;
            return;
        };
        if pending.request_id != request_id {
            self.report(Some(from), &DockError::NotFound(format!("unknown question id: {request_id}")))
                .await;
            return;
        }

        // Pair answers back to their questions (keyed by header, falling
        // back to the question text).
        let pairs: Vec<QuestionAnswer> = pending
            .questions
            .iter()
            .filter_map(|q| {
                let key = q.header.as_deref().unwrap_or(&q.question);
                answers.get(key).map(|answer| QuestionAnswer {
                    question: q.question.clone(),
                    answer: answer.clone(),
                })
            })
            .collect();
        let joined =
            pairs.iter().map(|p| p.answer.as_str()).collect::<Vec<_>>().join("\n");

        self.append_history(HistoryEntry::AnsweredQuestion {
            at_ms: self.clock.epoch_ms(),
            answers: pairs,
        });
        self.deps.store.set_pending_question(self.id, None);

        if let Err(e) = self.write_frame(OutboundFrame::User { text: joined, images: vec![] }).await
        {
            self.report(Some(from), &e).await;
        }
        self.set_status(SessionStatus::Running).await;
    }

    // ---- agent events ----

    async fn agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::AssistantText { text } => {
                if let Some(turn) = &mut self.turn {
                    turn.text.push_str(&text);
                }
                self.deps
                    .hub
                    .send_session(self.id, ServerEvent::TextOutput { session_id: self.id, text })
                    .await;
            }
            AgentEvent::AssistantThinking { text } => {
                if let Some(turn) = &mut self.turn {
                    turn.thinking.push_str(&text);
                }
                self.deps
                    .hub
                    .send_session(
                        self.id,
                        ServerEvent::ThinkingOutput { session_id: self.id, thinking: text },
                    )
                    .await;
            }
            AgentEvent::ToolUse { id, name, input } if name == "AskUserQuestion" => {
                self.question_prompt(id, input).await;
            }
            AgentEvent::ToolUse { id, name, input } => {
                self.append_history(HistoryEntry::ToolUse {
                    at_ms: self.clock.epoch_ms(),
                    tool_use_id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                self.deps
                    .hub
                    .send_session(
                        self.id,
                        ServerEvent::ToolUse {
                            session_id: self.id,
                            tool_name: name,
                            tool_use_id: id,
                            input,
                        },
                    )
                    .await;
            }
            AgentEvent::ToolResult { tool_use_id, content, is_error } => {
                // Unknown tool-use ids are kept as standalone entries.
                self.append_history(HistoryEntry::ToolResult {
                    at_ms: self.clock.epoch_ms(),
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                    is_error,
                });
                self.deps
                    .hub
                    .send_session(
                        self.id,
                        ServerEvent::ToolResult { session_id: self.id, tool_use_id, content, is_error },
                    )
                    .await;
            }
            AgentEvent::Result { text, agent_session_id, usage, model_usage } => {
                self.result(text, agent_session_id, usage, model_usage).await;
            }
            AgentEvent::System { subtype, agent_session_id, model, permission_mode, cwd, tools } => {
                self.system(subtype, agent_session_id, model, permission_mode, cwd, tools).await;
            }
            AgentEvent::Usage { sample } => {
                let now = self.clock.epoch_ms();
                if let Err(e) = self.deps.store.add_usage(self.id, None, sample, None, now) {
                    warn!(id = %self.id, %e, "usage record failed");
                }
                self.emit_usage().await;
            }
            AgentEvent::ControlResponse { success, request_id, response, error } => {
                self.control_response(success, request_id, response, error).await;
            }
            AgentEvent::Exit { code, signal } => self.exit(code, signal).await,
        }
    }

    async fn result(
        &mut self,
        text: String,
        agent_session_id: Option<String>,
        usage: Option<dock_core::Usage>,
        model_usage: BTreeMap<String, dock_core::ModelUsage>,
    ) {
        let now = self.clock.epoch_ms();
        let Some(session) = self.session() else { return };

        // Agents may rotate their own session ids; the newest one wins.
        if let Some(agent_id) = agent_session_id {
            if session.agent_session_id.as_deref() != Some(agent_id.as_str()) {
                if let Err(e) = self.deps.store.set_agent_session_id(self.id, agent_id) {
                    warn!(id = %self.id, %e, "agent session id update failed");
                }
            }
        }

        let mut recorded = false;
        if !model_usage.is_empty() {
            for (model, mu) in model_usage {
                if self
                    .deps
                    .store
                    .add_usage(self.id, Some(model), mu.usage, mu.context_window, now)
                    .is_ok()
                {
                    recorded = true;
                }
            }
        } else if let Some(sample) = usage {
            recorded = self.deps.store.add_usage(self.id, None, sample, None, now).is_ok();
        }
        if recorded {
            self.emit_usage().await;
        }

        self.flush_turn(now);
        self.deps
            .hub
            .send_session(self.id, ServerEvent::Result { session_id: self.id, result: text })
            .await;
        self.set_status(SessionStatus::Idle).await;
    }

    async fn system(
        &mut self,
        subtype: String,
        agent_session_id: Option<String>,
        model: Option<String>,
        permission_mode: Option<String>,
        cwd: Option<String>,
        tools: Vec<String>,
    ) {
        let Some(session) = self.session() else { return };
        debug!(id = %self.id, %subtype, "agent system event");

        // First occurrence binds the agent's own session id.
        if let Some(agent_id) = agent_session_id {
            if session.agent_session_id.is_none() {
                let _ = self.deps.store.set_agent_session_id(self.id, agent_id);
            }
        }
        if let Some(model) = &model {
            if session.model.as_deref() != Some(model.as_str()) {
                let _ = self.deps.store.set_model(self.id, model.clone());
            }
        }
        // The agent's reported mode always overrides the local one.
        if let Some(mode) = &permission_mode {
            if session.permission_mode.as_deref() != Some(mode.as_str()) {
                let _ = self.deps.store.set_permission_mode(self.id, mode.clone());
            }
        }
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::SystemInfo { session_id: self.id, model, permission_mode, cwd, tools },
            )
            .await;
    }

    async fn control_response(
        &mut self,
        success: bool,
        request_id: String,
        _response: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        let Some(change) = self.mode_change.take() else { return };
        if change.request_id != request_id {
            self.mode_change = Some(change);
            return;
        }
        if success {
            return;
        }
        // The optimistic mode was wrong; roll back and tell clients.
        warn!(id = %self.id, ?error, "permission mode change rejected by agent");
        if let Some(previous) = &change.previous {
            let _ = self.deps.store.set_permission_mode(self.id, previous.clone());
        }
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::SystemMessage {
                    session_id: self.id,
                    content: format!(
                        "permission mode change rejected: {}",
                        error.unwrap_or_else(|| "unknown error".into())
                    ),
                },
            )
            .await;
        self.deps
            .hub
            .send_session(
                self.id,
                ServerEvent::SystemInfo {
                    session_id: self.id,
                    model: None,
                    permission_mode: change.previous,
                    cwd: None,
                    tools: vec![],
                },
            )
            .await;
    }

    async fn exit(&mut self, code: Option<i32>, signal: Option<i32>) {
        info!(id = %self.id, ?code, ?signal, "agent exited");
        self.child = None;
        self.remove_mcp_config();

        // Prompt waiters cannot be answered any more.
        let Some(session) = self.session() else { return };
        if session.pending_permission.is_some() {
            for (_, conn) in self.deps.broker.cancel_session(self.id) {
                self.deps
                    .hub
                    .send_to(conn, ServerEvent::error(Some(self.id), &DockError::Cancelled))
                    .await;
            }
            self.deps.store.set_pending_permission(self.id, None);
        }
        if session.pending_question.is_some() {
            self.deps.store.set_pending_question(self.id, None);
        }

        let now = self.clock.epoch_ms();
        let had_turn = self.turn.is_some();
        self.flush_turn(now);

        if had_turn && code.unwrap_or(0) != 0 {
            let detail = match (code, signal) {
                (Some(code), _) => format!("code: {code}"),
                (None, Some(signal)) => format!("signal: {signal}"),
                (None, None) => "unknown".to_string(),
            };
            let err =
                DockError::AgentExit(format!("Claude process exited unexpectedly ({detail})"));
            self.deps.hub.send_session(self.id, ServerEvent::error(Some(self.id), &err)).await;
        }

        if session.status != SessionStatus::Idle {
            self.set_status(SessionStatus::Idle).await;
        }
    }

    /// Flush the accumulator: a thinking entry, then an assistant entry,
    /// non-empty buffers only.
    fn flush_turn(&mut self, at_ms: u64) {
        let Some(turn) = self.turn.take() else { return };
        if !turn.thinking.is_empty() {
            self.append_history(HistoryEntry::Thinking { at_ms, text: turn.thinking });
        }
        if !turn.text.is_empty() {
            self.append_history(HistoryEntry::Assistant { at_ms, text: turn.text });
        }
    }

    async fn emit_usage(&self) {
        if let Some(session) = self.session() {
            self.deps
                .hub
                .send_session(
                    self.id,
                    ServerEvent::UsageInfo { session_id: self.id, usage: session.usage },
                )
                .await;
        }
    }

    fn remove_mcp_config(&mut self) {
        if let Some(path) = self.mcp_config.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), %e, "mcp config removal failed");
            }
        }
    }

    // ---- teardown ----

    async fn delete(&mut self) -> Result<(), DockError> {
        if let Some(child) = &self.child {
            child.terminate();
        }
        self.child = None;
        self.remove_mcp_config();

        // Drop prompt waiters without a response.
        for (_, conn) in self.deps.broker.cancel_session(self.id) {
            self.deps
                .hub
                .send_to(conn, ServerEvent::error(Some(self.id), &DockError::Cancelled))
                .await;
        }

        let session = self.deps.store.delete(self.id)?;

        let cleanup = self.cleanup.take().or_else(|| {
            session.repo.as_ref().filter(|_| session.workspace_bound).and_then(|repo| {
                self.deps.workspaces.cleanup_for(repo, &session.working_dir)
            })
        });
        if let Some(cleanup) = cleanup {
            cleanup.run().await;
        }
        Ok(())
    }
}
