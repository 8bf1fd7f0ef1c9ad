// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dockd` - the AgentDock session daemon.

use clap::Parser;
use dock_daemon::lifecycle::{Daemon, DaemonConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockd", version, about = "AgentDock session daemon")]
struct Args {
    /// Port for the WebSocket gateway
    #[arg(long, default_value_t = 8787)]
    port: u16,

    /// Bind host for the WebSocket gateway
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Durable store directory (WAL + snapshots)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Root directory for local-copy session workspaces
    #[arg(long)]
    sessions_base_dir: Option<PathBuf>,

    /// Use the scripted fake agent instead of the real CLI
    #[arg(long)]
    mock: bool,
}

fn main() {
    // The mock agent is re-invoked as `dockd mock-agent <agent flags...>`;
    // those flags belong to the agent CLI contract, not to us, so this
    // bypasses clap entirely.
    if std::env::args().nth(1).as_deref() == Some("mock-agent") {
        std::process::exit(dock_daemon::agent::mock::run());
    }

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("DOCK_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let state_dir = dock_daemon::env::state_dir();
    let config = DaemonConfig {
        host: args.host,
        port: args.port,
        db_path: args.db_path.unwrap_or_else(|| state_dir.join("db")),
        sessions_base_dir: args.sessions_base_dir.unwrap_or_else(|| state_dir.join("sessions")),
        mock: args.mock,
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        match Daemon::start(config).await {
            Ok(daemon) => daemon.run().await,
            Err(e) => {
                eprintln!("failed to start daemon: {e}");
                std::process::exit(1);
            }
        }
    });
}
