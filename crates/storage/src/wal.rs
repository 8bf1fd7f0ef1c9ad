// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of store events.
//!
//! One JSON object per line: `{"seq": N, "event": {...}}`. Appends are
//! buffered; `flush` syncs to disk. A torn trailing line (crash mid-write)
//! is tolerated: replay stops at the first unparseable line with a warning.

use dock_core::StoreEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One WAL record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: StoreEvent,
}

/// Append-only event log with sequence numbers.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    write_seq: u64,
    processed_seq: u64,
    /// Entries read at open that still need replay (seq > processed_seq).
    pending: VecDeque<WalEntry>,
}

impl Wal {
    /// Open (or create) the WAL at `path`.
    ///
    /// `processed_seq` is the sequence already folded into the recovered
    /// snapshot; entries at or below it are skipped during replay.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut write_seq = processed_seq;
        let mut pending = VecDeque::new();
        if path.exists() {
            let mut reader = BufReader::new(File::open(&path)?);
            let mut valid_len: u64 = 0;
            let mut line = String::new();
            loop {
                line.clear();
                let n = reader.read_line(&mut line)?;
                if n == 0 {
                    break;
                }
                if !line.ends_with('\n') {
                    // Torn tail from a crash mid-append; discard it.
                    tracing::warn!(path = %path.display(), "incomplete WAL tail, truncating");
                    break;
                }
                if line.trim().is_empty() {
                    valid_len += n as u64;
                    continue;
                }
                let entry: WalEntry = match serde_json::from_str(&line) {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "corrupt WAL tail, truncating");
                        break;
                    }
                };
                valid_len += n as u64;
                write_seq = write_seq.max(entry.seq);
                if entry.seq > processed_seq {
                    pending.push_back(entry);
                }
            }
            // Drop any torn tail so later appends start on a line boundary.
            if valid_len < std::fs::metadata(&path)?.len() {
                OpenOptions::new().write(true).open(&path)?.set_len(valid_len)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, writer: BufWriter::new(file), write_seq, processed_seq, pending })
    }

    /// Append an event, returning its assigned sequence number.
    pub fn append(&mut self, event: &StoreEvent) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, event: event.clone() };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.write_seq = seq;
        Ok(seq)
    }

    /// Flush buffered appends and sync to disk.
    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Next entry past `processed_seq`, or `None` when replay is complete.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        Ok(self.pending.pop_front())
    }

    /// Record that all entries up to `seq` have been applied.
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// Highest sequence number written so far.
    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Truncate the log after a snapshot has captured state through
    /// `snapshot_seq`. Later entries (none, in the single-writer store) would
    /// be lost, so callers checkpoint at the current write_seq only.
    pub fn truncate(&mut self, snapshot_seq: u64) -> Result<(), WalError> {
        self.writer.flush()?;
        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.write_seq = self.write_seq.max(snapshot_seq);
        self.processed_seq = self.processed_seq.max(snapshot_seq);
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
