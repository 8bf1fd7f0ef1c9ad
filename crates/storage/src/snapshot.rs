// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number. Recovery loads the snapshot and
//! replays WAL entries after that sequence. Files are zstd-compressed JSON,
//! written atomically (tmp + rename) with rotating `.bak` copies.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;
const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0} (current: {SNAPSHOT_VERSION})")]
    Version(u32),
}

/// A snapshot of the materialized state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<S> {
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The complete materialized state
    pub state: S,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl<S> Snapshot<S> {
    pub fn new(seq: u64, state: S) -> Self {
        Self { version: SNAPSHOT_VERSION, seq, state, created_at: Utc::now() }
    }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

/// Write a snapshot atomically, rotating the previous file into a backup.
pub fn save_snapshot<S: Serialize>(
    path: impl AsRef<Path>,
    snapshot: &Snapshot<S>,
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = zstd::stream::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)?;
        let mut encoder = encoder.auto_finish();
        serde_json::to_writer(&mut encoder, snapshot)?;
    }

    if path.exists() {
        let _ = fs::rename(path, rotate_bak_path(path));
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a snapshot, returning `None` when the file does not exist.
pub fn load_snapshot<S: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Option<Snapshot<S>>, SnapshotError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path)?;
    let decoder = zstd::stream::Decoder::new(BufReader::new(file))?;
    let snapshot: Snapshot<S> = serde_json::from_reader(decoder)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(SnapshotError::Version(snapshot.version));
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
