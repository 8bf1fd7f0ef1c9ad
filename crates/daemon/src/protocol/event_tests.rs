// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dock_core::DockError;
use serde_json::json;

fn sid() -> SessionId {
    SessionId::from("ses-evt")
}

#[test]
fn status_change_wire_shape() {
    let event =
        ServerEvent::SessionStatusChanged { session_id: sid(), status: SessionStatus::Running };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "session_status_changed");
    assert_eq!(json["sessionId"], "ses-evt");
    assert_eq!(json["status"], "running");
}

#[test]
fn global_events_have_no_session_id() {
    let event = ServerEvent::SessionList { sessions: vec![] };
    assert_eq!(event.session_id(), None);
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("sessionId").is_none());
}

#[test]
fn only_rolling_output_is_droppable() {
    let droppable = ServerEvent::TextOutput { session_id: sid(), text: "x".into() };
    let thinking = ServerEvent::ThinkingOutput { session_id: sid(), thinking: "x".into() };
    let critical = ServerEvent::Result { session_id: sid(), result: "done".into() };
    let status =
        ServerEvent::SessionStatusChanged { session_id: sid(), status: SessionStatus::Idle };
    assert!(droppable.is_droppable());
    assert!(thinking.is_droppable());
    assert!(!critical.is_droppable());
    assert!(!status.is_droppable());
}

#[test]
fn error_event_carries_kind_and_message() {
    let event = ServerEvent::error(Some(sid()), &DockError::Busy("session is running".into()));
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["kind"], "busy");
    assert_eq!(json["message"], "busy: session is running");
    assert_eq!(json["sessionId"], "ses-evt");
}

#[test]
fn attached_snapshot_omits_empty_optionals() {
    let event = ServerEvent::SessionAttached {
        session_id: sid(),
        history: vec![],
        status: SessionStatus::Idle,
        is_running: false,
        usage: Usage::default(),
        model_usage: BTreeMap::new(),
        pending_permission: None,
        pending_question: None,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("pendingPermission").is_none());
    assert!(json.get("pendingQuestion").is_none());
    assert!(json.get("modelUsage").is_none());
    assert_eq!(json["isRunning"], false);
}

#[test]
fn ask_user_question_round_trips() {
    let event: ServerEvent = serde_json::from_value(json!({
        "type": "ask_user_question",
        "sessionId": "ses-evt",
        "requestId": "q1",
        "questions": [{"question": "Proceed?", "multiSelect": false}],
    }))
    .unwrap();
    match &event {
        ServerEvent::AskUserQuestion { request_id, questions, .. } => {
            assert_eq!(request_id, "q1");
            assert_eq!(questions.len(), 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn session_info_from_session() {
    let mut s = dock_core::Session::new(sid(), "demo", "/tmp/w".into(), 5);
    s.model = Some("m1".into());
    let info = SessionInfo::from(&s);
    assert_eq!(info.session_id, sid());
    assert_eq!(info.name, "demo");
    assert_eq!(info.model.as_deref(), Some("m1"));
    assert_eq!(info.status, SessionStatus::Idle);
}
