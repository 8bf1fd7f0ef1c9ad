// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scenario harness: an in-process engine with scripted agent
//! children and channel-backed connections.

use async_trait::async_trait;
use dock_core::{DockError, FakeClock, SessionId};
use dock_daemon::agent::{AgentChild, AgentEvent, AgentLauncher, OutboundFrame, SpawnSpec};
use dock_daemon::engine::{AgentCommand, Broker, Engine, EngineDeps};
use dock_daemon::listener::{ConnId, Hub};
use dock_daemon::protocol::{ClientCommand, ServerEvent};
use dock_daemon::store::SessionStore;
use dock_daemon::workspace::Workspaces;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Scripted agent: each launch pops one script, played after the first
/// frame is written to the child.
pub struct ScriptedAgents {
    scripts: Mutex<VecDeque<Vec<AgentEvent>>>,
    frames: Arc<Mutex<Vec<OutboundFrame>>>,
    taps: Mutex<Vec<mpsc::Sender<AgentEvent>>>,
}

impl ScriptedAgents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            frames: Arc::new(Mutex::new(Vec::new())),
            taps: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, events: Vec<AgentEvent>) {
        self.scripts.lock().push_back(events);
    }

    /// Feed an event to the most recently launched child.
    pub async fn inject(&self, event: AgentEvent) {
        let tx = self.taps.lock().last().cloned().expect("no child launched");
        tx.send(event).await.expect("child queue closed");
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().clone()
    }
}

struct ScriptedChild {
    event_tx: mpsc::Sender<AgentEvent>,
    script: Mutex<Option<Vec<AgentEvent>>>,
    frames: Arc<Mutex<Vec<OutboundFrame>>>,
}

#[async_trait]
impl AgentChild for ScriptedChild {
    async fn write_frame(&self, frame: &OutboundFrame) -> Result<(), DockError> {
        self.frames.lock().push(frame.clone());
        if let Some(script) = self.script.lock().take() {
            let tx = self.event_tx.clone();
            tokio::spawn(async move {
                for event in script {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
        }
        Ok(())
    }

    fn signal_interrupt(&self) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AgentEvent::Exit { code: None, signal: Some(2) }).await;
        });
    }

    fn terminate(&self) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AgentEvent::Exit { code: None, signal: Some(15) }).await;
        });
    }

    fn pid(&self) -> Option<u32> {
        Some(1)
    }
}

#[async_trait]
impl AgentLauncher for ScriptedAgents {
    async fn launch(
        &self,
        _spec: SpawnSpec,
        event_tx: mpsc::Sender<AgentEvent>,
    ) -> Result<Box<dyn AgentChild>, DockError> {
        self.taps.lock().push(event_tx.clone());
        let script = self.scripts.lock().pop_front().unwrap_or_default();
        Ok(Box::new(ScriptedChild {
            event_tx,
            script: Mutex::new(Some(script)),
            frames: Arc::clone(&self.frames),
        }))
    }
}

pub struct Spec {
    pub engine: Arc<Engine<FakeClock>>,
    pub hub: Arc<Hub>,
    pub store: Arc<SessionStore>,
    pub agents: Arc<ScriptedAgents>,
    pub dir: TempDir,
}

pub fn spec() -> Spec {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(SessionStore::open(&dir.path().join("db")).expect("store"));
    let hub = Arc::new(Hub::new());
    let agents = ScriptedAgents::new();
    let engine = Engine::new(
        EngineDeps {
            store: Arc::clone(&store),
            hub: Arc::clone(&hub),
            broker: Arc::new(Broker::new()),
            workspaces: Workspaces::new(
                dir.path().join("sessions"),
                dir.path().join("cache"),
                false,
            ),
            launcher: Arc::clone(&agents) as Arc<dyn AgentLauncher>,
            agent: AgentCommand::new("scripted-agent"),
        },
        FakeClock::new(),
    );
    Spec { engine, hub, store, agents, dir }
}

impl Spec {
    pub fn connect(&self) -> (ConnId, mpsc::Receiver<ServerEvent>) {
        self.hub.register()
    }

    pub async fn send(&self, conn: ConnId, cmd: ClientCommand) {
        self.engine.handle_command(conn, cmd).await;
    }

    pub async fn create(
        &self,
        conn: ConnId,
        rx: &mut mpsc::Receiver<ServerEvent>,
        name: &str,
        working_dir: &str,
    ) -> SessionId {
        self.send(
            conn,
            ClientCommand::CreateSession {
                name: name.into(),
                working_dir: working_dir.into(),
                repo: None,
            },
        )
        .await;
        match next(rx).await {
            ServerEvent::SessionCreated { session_id, .. } => session_id,
            other => panic!("expected session_created, got {other:?}"),
        }
    }
}

pub async fn next(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip forward to the next event satisfying `pred`.
pub async fn next_where(
    rx: &mut mpsc::Receiver<ServerEvent>,
    pred: impl Fn(&ServerEvent) -> bool,
) -> ServerEvent {
    loop {
        let event = next(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

pub fn init_event(model: &str, agent_id: &str) -> AgentEvent {
    AgentEvent::System {
        subtype: "init".into(),
        agent_session_id: Some(agent_id.into()),
        model: Some(model.into()),
        permission_mode: None,
        cwd: None,
        tools: vec![],
    }
}

pub fn text_event(text: &str) -> AgentEvent {
    AgentEvent::AssistantText { text: text.into() }
}

pub fn result_event(text: &str, agent_id: &str) -> AgentEvent {
    AgentEvent::Result {
        text: text.into(),
        agent_session_id: Some(agent_id.into()),
        usage: None,
        model_usage: std::collections::BTreeMap::new(),
    }
}
