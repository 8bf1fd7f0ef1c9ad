// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dock_core::SessionId;
use tempfile::tempdir;

fn test_event(name: &str) -> StoreEvent {
    StoreEvent::SessionRenamed { id: SessionId::from("ses-wal"), name: name.into() }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dock.wal");

    let wal = Wal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(wal.write_seq(), 0);
    assert_eq!(wal.processed_seq(), 0);
}

#[test]
fn append_assigns_increasing_seqs() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("dock.wal"), 0).unwrap();

    assert_eq!(wal.append(&test_event("a")).unwrap(), 1);
    assert_eq!(wal.append(&test_event("b")).unwrap(), 2);
    assert_eq!(wal.write_seq(), 2);
}

#[test]
fn reopen_replays_unprocessed_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dock.wal");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("a")).unwrap();
        wal.append(&test_event("b")).unwrap();
        wal.append(&test_event("c")).unwrap();
        wal.flush().unwrap();
    }

    // Snapshot covered seq 1 and 2; only "c" replays.
    let mut wal = Wal::open(&path, 2).unwrap();
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
    assert_eq!(entry.event, test_event("c"));
    assert!(wal.next_unprocessed().unwrap().is_none());
    assert_eq!(wal.write_seq(), 3);
}

#[test]
fn mark_processed_advances_monotonically() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("dock.wal"), 0).unwrap();
    wal.append(&test_event("a")).unwrap();
    wal.mark_processed(1);
    wal.mark_processed(0);
    assert_eq!(wal.processed_seq(), 1);
}

#[test]
fn torn_tail_is_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dock.wal");
    {
        let mut wal = Wal::open(&path, 0).unwrap();
        wal.append(&test_event("a")).unwrap();
        wal.flush().unwrap();
    }
    // Simulate a crash mid-append.
    {
        use std::io::Write;
        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{\"seq\": 2, \"event\": {\"type\": \"sess").unwrap();
    }

    let mut wal = Wal::open(&path, 0).unwrap();
    let entry = wal.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 1);
    assert!(wal.next_unprocessed().unwrap().is_none());
    // New appends continue after the last intact entry.
    assert_eq!(wal.append(&test_event("b")).unwrap(), 2);
}

proptest::proptest! {
    /// Whatever is appended and flushed is replayed, in order, on reopen.
    #[test]
    fn replay_reproduces_appended_events(names in proptest::collection::vec("[a-z0-9 ]{0,24}", 1..20)) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dock.wal");
        {
            let mut wal = Wal::open(&path, 0).unwrap();
            for name in &names {
                wal.append(&test_event(name)).unwrap();
            }
            wal.flush().unwrap();
        }

        let mut wal = Wal::open(&path, 0).unwrap();
        let mut replayed = Vec::new();
        while let Some(entry) = wal.next_unprocessed().unwrap() {
            replayed.push(entry.event);
        }
        let expected: Vec<StoreEvent> = names.iter().map(|n| test_event(n)).collect();
        proptest::prop_assert_eq!(replayed, expected);
    }
}

#[test]
fn truncate_resets_log_after_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dock.wal");
    let mut wal = Wal::open(&path, 0).unwrap();
    wal.append(&test_event("a")).unwrap();
    wal.append(&test_event("b")).unwrap();
    wal.flush().unwrap();

    wal.truncate(2).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(wal.processed_seq(), 2);

    // Sequences keep increasing after truncation.
    assert_eq!(wal.append(&test_event("c")).unwrap(), 3);
    wal.flush().unwrap();

    let mut reopened = Wal::open(&path, 2).unwrap();
    let entry = reopened.next_unprocessed().unwrap().unwrap();
    assert_eq!(entry.seq, 3);
}
