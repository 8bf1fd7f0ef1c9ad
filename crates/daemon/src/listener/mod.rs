// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket client gateway.
//!
//! One long-lived connection per client. Each connection gets a read loop
//! (parse + dispatch commands) and a write task draining its hub queue, so
//! delivery to one slow client never blocks another. Malformed inbound
//! frames are answered with an `error` event and the connection stays open.

mod hub;

pub use hub::{ConnId, Hub, CONN_QUEUE_DEPTH};

use crate::engine::Engine;
use crate::protocol::{ClientCommand, ServerEvent};
use dock_core::{Clock, DockError};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Accept loop over a bound TCP listener.
pub struct Listener<C: Clock> {
    tcp: TcpListener,
    engine: Arc<Engine<C>>,
}

impl<C: Clock> Listener<C> {
    pub fn new(tcp: TcpListener, engine: Arc<Engine<C>>) -> Self {
        Self { tcp, engine }
    }

    /// Run until shutdown, spawning a handler per connection.
    pub async fn run(self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                result = self.tcp.accept() => match result {
                    Ok((stream, addr)) => {
                        debug!(%addr, "client connected");
                        let engine = Arc::clone(&self.engine);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, engine).await {
                                debug!(%addr, %e, "connection ended");
                            }
                        });
                    }
                    Err(e) => error!(%e, "accept error"),
                },
                _ = shutdown.cancelled() => {
                    info!("listener shutting down");
                    break;
                }
            }
        }
    }
}

async fn handle_connection<C: Clock>(
    stream: TcpStream,
    engine: Arc<Engine<C>>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut reader) = ws.split();
    let (conn, mut outbound) = engine.hub().register();

    // Write task: drain this connection's hub queue.
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(%e, "event serialization failed");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Read loop: inbound commands are routed to the engine. Routing only
    // enqueues work, so the loop is never held up by a busy session.
    while let Some(msg) = reader.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                Ok(cmd) => engine.handle_command(conn, cmd).await,
                Err(e) => {
                    let err = DockError::Protocol(format!("malformed command: {e}"));
                    engine.hub().send_to(conn, ServerEvent::error(None, &err)).await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // Ping/Pong/Binary
            Err(e) => {
                debug!(conn, %e, "read error");
                break;
            }
        }
    }

    engine.handle_disconnect(conn).await;
    writer.abort();
    Ok(())
}
