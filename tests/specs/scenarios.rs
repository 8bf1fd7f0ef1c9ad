// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The six end-to-end scenarios for the session runtime.

use super::harness::*;
use dock_core::{ErrorKind, HistoryEntry, PermissionDecision, SessionStatus};
use dock_daemon::agent::AgentEvent;
use dock_daemon::protocol::{ClientCommand, ServerEvent};
use serde_json::json;

/// S1. Basic turn: create, message, observe the ordered event trace, and
/// find `[user, assistant]` in the replayed history.
#[tokio::test]
async fn s1_basic_turn() {
    let spec = spec();
    let (conn, mut rx) = spec.connect();
    let id = spec.create(conn, &mut rx, "demo", "/tmp/w").await;

    spec.agents.script(vec![
        init_event("m1", "a1"),
        text_event("hello"),
        result_event("done", "a1"),
    ]);
    spec.send(conn, ClientCommand::UserMessage {
        session_id: id,
        content: "hi".into(),
        images: vec![],
    })
    .await;

    match next(&mut rx).await {
        ServerEvent::SessionStatusChanged { status, .. } => {
            assert_eq!(status, SessionStatus::Running)
        }
        other => panic!("expected running, got {other:?}"),
    }
    match next(&mut rx).await {
        ServerEvent::SystemInfo { model, .. } => assert_eq!(model.as_deref(), Some("m1")),
        other => panic!("expected system_info, got {other:?}"),
    }
    match next(&mut rx).await {
        ServerEvent::TextOutput { text, .. } => assert_eq!(text, "hello"),
        other => panic!("expected text_output, got {other:?}"),
    }
    match next(&mut rx).await {
        ServerEvent::Result { result, .. } => assert_eq!(result, "done"),
        other => panic!("expected result, got {other:?}"),
    }
    match next(&mut rx).await {
        ServerEvent::SessionStatusChanged { status, .. } => {
            assert_eq!(status, SessionStatus::Idle)
        }
        other => panic!("expected idle, got {other:?}"),
    }

    spec.send(conn, ClientCommand::AttachSession { session_id: id }).await;
    match next(&mut rx).await {
        ServerEvent::SessionAttached { history, .. } => match &history[..] {
            [HistoryEntry::User { text: user, .. }, HistoryEntry::Assistant { text: reply, .. }] => {
                assert_eq!(user, "hi");
                assert_eq!(reply, "hello");
            }
            other => panic!("unexpected history: {other:?}"),
        },
        other => panic!("expected session_attached, got {other:?}"),
    }
}

/// S2. Permission round-trip: running → waiting_permission → running →
/// idle, the service observes the allow exactly once, and a duplicate
/// response yields `not_found` without touching state.
#[tokio::test]
async fn s2_permission_round_trip() {
    let spec = spec();
    let (client, mut client_rx) = spec.connect();
    let (service, mut service_rx) = spec.connect();
    let id = spec.create(client, &mut client_rx, "demo", "/tmp/w").await;

    spec.agents.script(vec![init_event("m1", "a1")]);
    spec.send(client, ClientCommand::UserMessage {
        session_id: id,
        content: "write foo".into(),
        images: vec![],
    })
    .await;
    next_where(&mut client_rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Running, .. })
    })
    .await;

    spec.send(service, ClientCommand::PermissionRequest {
        session_id: id,
        request_id: "r1".into(),
        tool_name: "Write".into(),
        input: json!({"path": "/tmp/w/foo"}),
    })
    .await;
    next_where(&mut client_rx, |e| {
        matches!(e, ServerEvent::PermissionRequest { request_id, .. } if request_id == "r1")
    })
    .await;
    next_where(&mut client_rx, |e| {
        matches!(
            e,
            ServerEvent::SessionStatusChanged { status: SessionStatus::WaitingPermission, .. }
        )
    })
    .await;

    spec.send(client, ClientCommand::PermissionResponse {
        session_id: id,
        request_id: "r1".into(),
        response: PermissionDecision {
            behavior: "allow".into(),
            updated_input: None,
            message: None,
        },
    })
    .await;

    // The service observes the allow exactly once.
    let relayed = next_where(&mut service_rx, |e| {
        matches!(e, ServerEvent::PermissionResponse { .. })
    })
    .await;
    match relayed {
        ServerEvent::PermissionResponse { request_id, response, .. } => {
            assert_eq!(request_id, "r1");
            assert_eq!(response.behavior, "allow");
        }
        _ => unreachable!(),
    }
    next_where(&mut client_rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Running, .. })
    })
    .await;

    spec.agents.inject(result_event("done", "a1")).await;
    next_where(&mut client_rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Idle, .. })
    })
    .await;

    // Duplicate response: not_found, and state is unchanged.
    spec.send(client, ClientCommand::PermissionResponse {
        session_id: id,
        request_id: "r1".into(),
        response: PermissionDecision {
            behavior: "deny".into(),
            updated_input: None,
            message: None,
        },
    })
    .await;
    let error = next_where(&mut client_rx, |e| matches!(e, ServerEvent::Error { .. })).await;
    match error {
        ServerEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        _ => unreachable!(),
    }
    assert_eq!(spec.store.get(id).unwrap().status, SessionStatus::Idle);
}

/// S3. Cross-session isolation: a result for s2 leaves s1 running, and the
/// only status change observed names s2.
#[tokio::test]
async fn s3_cross_session_isolation() {
    let spec = spec();
    let (conn, mut rx) = spec.connect();
    let s1 = spec.create(conn, &mut rx, "one", "/tmp/w1").await;
    let s2 = spec.create(conn, &mut rx, "two", "/tmp/w2").await;

    spec.agents.script(vec![init_event("m1", "a1")]);
    spec.send(conn, ClientCommand::UserMessage {
        session_id: s1,
        content: "go".into(),
        images: vec![],
    })
    .await;
    spec.agents.script(vec![init_event("m1", "a2")]);
    spec.send(conn, ClientCommand::UserMessage {
        session_id: s2,
        content: "go".into(),
        images: vec![],
    })
    .await;

    let mut running = 0;
    while running < 2 {
        if matches!(
            next(&mut rx).await,
            ServerEvent::SessionStatusChanged { status: SessionStatus::Running, .. }
        ) {
            running += 1;
        }
    }

    spec.agents.inject(result_event("done", "a2")).await;
    let changed = next_where(&mut rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { .. })
    })
    .await;
    match changed {
        ServerEvent::SessionStatusChanged { session_id, status } => {
            assert_eq!(session_id, s2);
            assert_eq!(status, SessionStatus::Idle);
        }
        _ => unreachable!(),
    }
    assert_eq!(spec.store.get(s1).unwrap().status, SessionStatus::Running);
    assert_eq!(spec.store.get(s2).unwrap().status, SessionStatus::Idle);
}

/// S4. Attach replay of a modal: a question asked while client A was
/// connected is present in client B's attach snapshot, and B can answer it.
#[tokio::test]
async fn s4_attach_replays_pending_question() {
    let spec = spec();
    let (a, mut rx_a) = spec.connect();
    let id = spec.create(a, &mut rx_a, "demo", "/tmp/w").await;

    spec.agents.script(vec![
        init_event("m1", "a1"),
        AgentEvent::ToolUse {
            id: "q1".into(),
            name: "AskUserQuestion".into(),
            input: json!({"questions": [{
                "question": "Proceed?",
                "header": "Plan",
                "options": [{"label": "yes"}, {"label": "no"}],
            }]}),
        },
    ]);
    spec.send(a, ClientCommand::UserMessage {
        session_id: id,
        content: "start".into(),
        images: vec![],
    })
    .await;
    next_where(&mut rx_a, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::WaitingInput, .. })
    })
    .await;

    // A disconnects without answering; B attaches and sees the prompt.
    spec.engine.handle_disconnect(a).await;
    let (b, mut rx_b) = spec.connect();
    spec.send(b, ClientCommand::AttachSession { session_id: id }).await;
    match next(&mut rx_b).await {
        ServerEvent::SessionAttached { pending_question, .. } => {
            let pending = pending_question.expect("pending question replayed");
            assert_eq!(pending.request_id, "q1");
            assert_eq!(pending.questions[0].question, "Proceed?");
        }
        other => panic!("expected session_attached, got {other:?}"),
    }

    spec.send(b, ClientCommand::QuestionResponse {
        session_id: id,
        request_id: "q1".into(),
        answers: [("Plan".to_string(), "yes".to_string())].into_iter().collect(),
    })
    .await;
    next_where(&mut rx_b, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Running, .. })
    })
    .await;
    assert!(spec.store.get(id).unwrap().pending_question.is_none());
}

/// S5. Dirty exit: partial text is flushed to history, the client sees the
/// literal agent-exit error, and the session returns to idle.
#[tokio::test]
async fn s5_dirty_exit() {
    let spec = spec();
    let (conn, mut rx) = spec.connect();
    let id = spec.create(conn, &mut rx, "demo", "/tmp/w").await;

    spec.agents.script(vec![
        text_event("partial"),
        AgentEvent::Exit { code: Some(1), signal: None },
    ]);
    spec.send(conn, ClientCommand::UserMessage {
        session_id: id,
        content: "go".into(),
        images: vec![],
    })
    .await;

    let error = next_where(&mut rx, |e| matches!(e, ServerEvent::Error { .. })).await;
    match error {
        ServerEvent::Error { kind, message, .. } => {
            assert_eq!(kind, ErrorKind::AgentExit);
            assert_eq!(message, "Claude process exited unexpectedly (code: 1)");
        }
        _ => unreachable!(),
    }
    next_where(&mut rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Idle, .. })
    })
    .await;

    let session = spec.store.get(id).unwrap();
    assert!(session
        .history
        .iter()
        .any(|e| matches!(e, HistoryEntry::Assistant { text, .. } if text == "partial")));
}

/// S6. Workspace cleanup on delete: the local-copy subtree is gone and a
/// subsequent attach yields not_found.
#[tokio::test]
async fn s6_workspace_cleanup_on_delete() {
    let spec = spec();
    let (conn, mut rx) = spec.connect();

    let source = spec.dir.path().join("src-repo");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("main.rs"), "fn main() {}").unwrap();

    spec.send(conn, ClientCommand::CreateSession {
        name: "ws".into(),
        working_dir: source.display().to_string(),
        repo: Some(dock_core::RepoDescriptor::local_copy(source.display().to_string(), "r1")),
    })
    .await;
    let id = match next(&mut rx).await {
        ServerEvent::SessionCreated { session_id, .. } => session_id,
        other => panic!("expected session_created, got {other:?}"),
    };

    spec.agents.script(vec![result_event("ok", "a1")]);
    spec.send(conn, ClientCommand::UserMessage {
        session_id: id,
        content: "go".into(),
        images: vec![],
    })
    .await;
    next_where(&mut rx, |e| {
        matches!(e, ServerEvent::SessionStatusChanged { status: SessionStatus::Idle, .. })
    })
    .await;

    let workspace = spec.store.get(id).unwrap().working_dir.clone();
    assert!(workspace.starts_with(spec.dir.path().join("sessions")));
    assert!(workspace.join("main.rs").exists());

    spec.send(conn, ClientCommand::DeleteSession { session_id: id }).await;
    next_where(&mut rx, |e| matches!(e, ServerEvent::SessionDeleted { .. })).await;

    assert!(!workspace.exists());
    spec.send(conn, ClientCommand::AttachSession { session_id: id }).await;
    let error = next_where(&mut rx, |e| matches!(e, ServerEvent::Error { .. })).await;
    match error {
        ServerEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::NotFound),
        _ => unreachable!(),
    }
}
