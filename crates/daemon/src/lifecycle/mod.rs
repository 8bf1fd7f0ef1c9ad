// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon assembly and lifecycle.
//!
//! Wires the store, hub, broker, engine, listener, usage reporter, and
//! checkpointer together; owns the shutdown token.

use crate::agent::ProcessLauncher;
use crate::engine::{AgentCommand, Broker, Engine, EngineDeps};
use crate::env;
use crate::listener::{Hub, Listener};
use crate::store::SessionStore;
use crate::workspace::Workspaces;
use dock_core::{DockError, SystemClock};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub sessions_base_dir: PathBuf,
    /// Use the scripted fake agent instead of the real CLI.
    pub mock: bool,
}

pub struct Daemon {
    engine: Arc<Engine<SystemClock>>,
    shutdown: CancellationToken,
    local_addr: SocketAddr,
}

impl Daemon {
    /// Recover state, bind the gateway, and start all background tasks.
    pub async fn start(config: DaemonConfig) -> Result<Self, DockError> {
        let store = Arc::new(SessionStore::open(&config.db_path)?);
        let hub = Arc::new(Hub::new());
        let broker = Arc::new(Broker::new());
        let workspaces = Workspaces::new(
            config.sessions_base_dir.clone(),
            env::repo_cache_root(),
            env::container_mode(),
        );

        let agent = if config.mock {
            let dockd = match env::mock_binary() {
                Some(path) => path,
                None => std::env::current_exe()
                    .map_err(|e| DockError::Internal(format!("current_exe: {e}")))?,
            };
            AgentCommand::mock(dockd.display().to_string())
        } else {
            let mut agent = AgentCommand::new(env::agent_cmd());
            agent.permission_tool_cmd = env::permission_tool_cmd();
            agent
        };

        let clock = SystemClock;
        let engine = Engine::new(
            EngineDeps {
                store: Arc::clone(&store),
                hub: Arc::clone(&hub),
                broker,
                workspaces,
                launcher: Arc::new(ProcessLauncher),
                agent,
            },
            clock.clone(),
        );

        let shutdown = CancellationToken::new();

        let tcp = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| {
                DockError::Internal(format!("bind {}:{} failed: {e}", config.host, config.port))
            })?;
        let local_addr = tcp
            .local_addr()
            .map_err(|e| DockError::Internal(format!("local_addr: {e}")))?;
        info!(%local_addr, mock = config.mock, "gateway listening");

        tokio::spawn(Listener::new(tcp, Arc::clone(&engine)).run(shutdown.clone()));

        crate::usage_reporter::spawn(
            Arc::clone(&store),
            Arc::clone(&hub),
            clock,
            env::usage_interval(),
            shutdown.clone(),
        );

        // Periodic snapshot so WAL replay stays bounded.
        let checkpoint_store = Arc::clone(&store);
        let checkpoint_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(env::checkpoint_interval());
            ticker.tick().await; // skip the immediate tick
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = checkpoint_store.checkpoint() {
                            warn!(%e, "checkpoint failed");
                        }
                    }
                    _ = checkpoint_shutdown.cancelled() => break,
                }
            }
        });

        Ok(Self { engine, shutdown, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until ctrl-c, then tear everything down.
    pub async fn run(self) {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        self.stop().await;
    }

    /// Cancel background tasks, stop session children, checkpoint.
    pub async fn stop(self) {
        self.shutdown.cancel();
        self.engine.shutdown().await;
        info!("daemon stopped");
    }
}
