// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic global usage broadcast.
//!
//! Runs independently of the session tasks: on every tick it aggregates the
//! store's usage ledger and pushes a `global_usage` snapshot to every
//! connection. The first tick fires immediately, so a fresh connection gets
//! its baseline within one interval of connecting.

use crate::listener::Hub;
use crate::protocol::ServerEvent;
use crate::store::SessionStore;
use dock_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub fn spawn<C: Clock>(
    store: Arc<SessionStore>,
    hub: Arc<Hub>,
    clock: C,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (today, totals, daily, blocks) = store.usage_report(clock.epoch_ms());
                    debug!(connections = hub.connection_count(), "usage tick");
                    hub.broadcast(ServerEvent::GlobalUsage { today, totals, daily, blocks }).await;
                }
                _ = shutdown.cancelled() => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "usage_reporter_tests.rs"]
mod tests;
