// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dock_core::Attachment;
use tempfile::tempdir;

fn open(dir: &Path) -> SessionStore {
    SessionStore::open(dir).unwrap()
}

fn user(at_ms: u64, text: &str) -> HistoryEntry {
    HistoryEntry::User { at_ms, text: text.into(), images: Vec::<Attachment>::new() }
}

#[test]
fn create_get_list_round_trip() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());

    let a = store.create("alpha", PathBuf::from("/a"), None, 10).unwrap();
    let b = store.create("beta", PathBuf::from("/b"), None, 20).unwrap();

    assert_eq!(store.get(a.id).unwrap().name, "alpha");
    let listed: Vec<String> = store.list().into_iter().map(|s| s.name).collect();
    assert_eq!(listed, vec!["beta".to_string(), "alpha".to_string()]);
    assert_ne!(a.id, b.id);
}

#[test]
fn mutations_survive_reopen_with_idle_status() {
    let dir = tempdir().unwrap();
    let id = {
        let store = open(dir.path());
        let session = store.create("demo", PathBuf::from("/w"), None, 10).unwrap();
        store.append_history(session.id, user(11, "hi")).unwrap();
        store.set_model(session.id, "m1".into()).unwrap();
        store.set_agent_session_id(session.id, "a1".into()).unwrap();
        store.set_status(session.id, dock_core::SessionStatus::Running);
        store.set_pending_question(
            session.id,
            Some(PendingQuestion { request_id: "q1".into(), questions: vec![] }),
        );
        session.id
    };

    let store = open(dir.path());
    let session = store.get(id).unwrap();
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.model.as_deref(), Some("m1"));
    assert_eq!(session.agent_session_id.as_deref(), Some("a1"));
    // Runtime-only state rehydrates clean.
    assert_eq!(session.status, dock_core::SessionStatus::Idle);
    assert!(session.pending_question.is_none());
}

#[test]
fn delete_removes_record_and_returns_final_state() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = store.create("demo", PathBuf::from("/w"), None, 10).unwrap();
    store.append_history(session.id, user(11, "hi")).unwrap();

    let removed = store.delete(session.id).unwrap();
    assert_eq!(removed.history.len(), 1);
    assert!(store.get(session.id).is_none());
    assert!(matches!(store.delete(session.id), Err(DockError::NotFound(_))));
}

#[test]
fn mutators_reject_unknown_sessions() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let ghost = SessionId::from("ses-ghost");
    assert!(matches!(store.rename(ghost, "x"), Err(DockError::NotFound(_))));
    assert!(matches!(store.append_history(ghost, user(1, "x")), Err(DockError::NotFound(_))));
    assert!(matches!(store.set_model(ghost, "m".into()), Err(DockError::NotFound(_))));
}

#[test]
fn checkpoint_truncates_wal_and_reopens_from_snapshot() {
    let dir = tempdir().unwrap();
    let id = {
        let store = open(dir.path());
        let session = store.create("demo", PathBuf::from("/w"), None, 10).unwrap();
        for i in 0..5 {
            store.append_history(session.id, user(i, "msg")).unwrap();
        }
        store.checkpoint().unwrap();
        // Post-checkpoint writes land in the fresh WAL.
        store.append_history(session.id, user(99, "after")).unwrap();
        session.id
    };

    assert!(dir.path().join("dock.snapshot").exists());

    let store = open(dir.path());
    let session = store.get(id).unwrap();
    assert_eq!(session.history.len(), 6);
    assert_eq!(session.history.last().unwrap().at_ms(), 99);
}

#[test]
fn usage_report_aggregates_today_daily_blocks() {
    let dir = tempdir().unwrap();
    let store = open(dir.path());
    let session = store.create("demo", PathBuf::from("/w"), None, 10).unwrap();

    let sample = Usage { input_tokens: 10, output_tokens: 2, ..Default::default() };
    store.add_usage(session.id, Some("m1".into()), sample, Some(1000), 0).unwrap();
    store.add_usage(session.id, None, sample, None, 86_400_000).unwrap();

    let (today, totals, daily, blocks) = store.usage_report(86_400_001);
    assert_eq!(today.input_tokens, 10);
    assert_eq!(totals.input_tokens, 20);
    assert_eq!(daily.len(), 2);
    assert_eq!(blocks.len(), 2);

    let session = store.get(session.id).unwrap();
    assert_eq!(session.usage.input_tokens, 20);
    assert_eq!(session.model_usage.get("m1").unwrap().context_window, Some(1000));
}

#[test]
fn workspace_binding_persists() {
    let dir = tempdir().unwrap();
    let id = {
        let store = open(dir.path());
        let session = store.create("demo", PathBuf::from("/requested"), None, 10).unwrap();
        assert!(!session.workspace_bound);
        store.bind_workspace(session.id, PathBuf::from("/provisioned")).unwrap();
        session.id
    };

    let store = open(dir.path());
    let session = store.get(id).unwrap();
    assert!(session.workspace_bound);
    assert_eq!(session.working_dir, PathBuf::from("/provisioned"));
}
