// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent child process supervision.
//!
//! Spawns one child per running session with plain pipes and stream-JSON on
//! both ends. Stdin stays open for the session's lifetime so later control
//! frames can be written; decoded stdout events and the final `Exit` arrive
//! on the event channel handed to `launch`.

use crate::agent::codec::{decode_line, AgentEvent, LineAssembler, OutboundFrame};
use async_trait::async_trait;
use dock_core::DockError;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Everything needed to spawn an agent child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Handle to a running agent child.
#[async_trait]
pub trait AgentChild: Send + Sync {
    /// Write one frame to the child's stdin. The write is atomic: concurrent
    /// emitters never interleave within a line.
    async fn write_frame(&self, frame: &OutboundFrame) -> Result<(), DockError>;

    /// Platform-appropriate soft-cancel of the current turn. Never reaps.
    fn signal_interrupt(&self);

    /// Hard stop. The reader task reaps the child and emits `Exit`.
    fn terminate(&self);

    fn pid(&self) -> Option<u32>;
}

/// Spawns agent children. Trait so the engine can run against a scripted
/// in-process fake in tests.
#[async_trait]
pub trait AgentLauncher: Send + Sync + 'static {
    async fn launch(
        &self,
        spec: SpawnSpec,
        event_tx: mpsc::Sender<AgentEvent>,
    ) -> Result<Box<dyn AgentChild>, DockError>;
}

/// The real launcher: `tokio::process` with piped stdio.
#[derive(Default)]
pub struct ProcessLauncher;

struct ProcessChild {
    stdin: Arc<Mutex<ChildStdin>>,
    pid: Option<u32>,
}

#[async_trait]
impl AgentChild for ProcessChild {
    async fn write_frame(&self, frame: &OutboundFrame) -> Result<(), DockError> {
        let line = frame.to_line()?;
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DockError::Internal(format!("agent stdin write failed: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| DockError::Internal(format!("agent stdin flush failed: {e}")))?;
        Ok(())
    }

    fn signal_interrupt(&self) {
        signal_child(self.pid, InterruptKind::Soft);
    }

    fn terminate(&self) {
        signal_child(self.pid, InterruptKind::Kill);
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }
}

enum InterruptKind {
    Soft,
    Kill,
}

#[cfg(unix)]
fn signal_child(pid: Option<u32>, kind: InterruptKind) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let signal = match kind {
        InterruptKind::Soft => Signal::SIGINT,
        InterruptKind::Kill => Signal::SIGTERM,
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
        debug!(pid, %e, "agent signal failed (already gone?)");
    }
}

#[cfg(not(unix))]
fn signal_child(pid: Option<u32>, _kind: InterruptKind) {
    // No soft-cancel without signals; the reader task reaps on stdin close.
    debug!(?pid, "signals unsupported on this platform");
}

#[async_trait]
impl AgentLauncher for ProcessLauncher {
    async fn launch(
        &self,
        spec: SpawnSpec,
        event_tx: mpsc::Sender<AgentEvent>,
    ) -> Result<Box<dyn AgentChild>, DockError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            DockError::Internal(format!("failed to spawn agent `{}`: {e}", spec.program))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DockError::Internal("agent child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DockError::Internal("agent child has no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DockError::Internal("agent child has no stderr".into()))?;

        let pid = child.id();

        // Drain stderr into the daemon log.
        tokio::spawn(async move {
            use tokio::io::AsyncBufReadExt;
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "agent_stderr", "{}", line);
            }
        });

        tokio::spawn(read_loop(child, stdout, event_tx));

        Ok(Box::new(ProcessChild { stdin: Arc::new(Mutex::new(stdin)), pid }))
    }
}

/// Continuous stdout reader. Decodes events until EOF, then reaps the child
/// and emits the final `Exit`.
async fn read_loop(
    mut child: Child,
    mut stdout: tokio::process::ChildStdout,
    event_tx: mpsc::Sender<AgentEvent>,
) {
    let mut assembler = LineAssembler::new();
    let mut buf = [0u8; 8192];

    loop {
        match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in assembler.push(&buf[..n]) {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!(%e, "oversized agent output line dropped");
                            continue;
                        }
                    };
                    match decode_line(&line) {
                        Ok(events) => {
                            for event in events {
                                if event_tx.send(event).await.is_err() {
                                    // Session task gone; keep draining so the
                                    // child does not block on a full pipe.
                                }
                            }
                        }
                        Err(e) => {
                            warn!(%e, line = dock_core::clip(&line, 200), "skipping malformed agent output");
                        }
                    }
                }
            }
            Err(e) => {
                warn!(%e, "agent stdout read error");
                break;
            }
        }
    }

    let (code, signal) = match child.wait().await {
        Ok(status) => {
            #[cfg(unix)]
            let signal = {
                use std::os::unix::process::ExitStatusExt;
                status.signal()
            };
            #[cfg(not(unix))]
            let signal = None;
            (status.code(), signal)
        }
        Err(e) => {
            warn!(%e, "agent wait failed");
            (None, None)
        }
    };

    debug!(?code, ?signal, "agent child exited");
    let _ = event_tx.send(AgentEvent::Exit { code, signal }).await;
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
