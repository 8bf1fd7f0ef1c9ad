// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dock-storage: append-only WAL and snapshot persistence for the daemon.
//!
//! The write path is WAL-first: every durable mutation is appended (and
//! flushed) before it is applied to in-memory state. Recovery loads the
//! newest snapshot and replays WAL entries past its sequence number.

mod snapshot;
mod wal;

pub use snapshot::{load_snapshot, save_snapshot, Snapshot, SnapshotError, SNAPSHOT_VERSION};
pub use wal::{Wal, WalEntry, WalError};
