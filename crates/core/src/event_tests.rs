// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sid() -> SessionId {
    SessionId::from("ses-abc")
}

#[test]
fn events_carry_type_tag() {
    let event = StoreEvent::SessionCreated {
        id: sid(),
        name: "demo".into(),
        working_dir: PathBuf::from("/tmp/w"),
        created_at_ms: 1,
        repo: None,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "session:created");
    assert_eq!(json["id"], "ses-abc");
}

#[test]
fn unknown_type_deserializes_to_custom() {
    let event: StoreEvent =
        serde_json::from_str(r#"{"type": "session:from_the_future", "id": "ses-x"}"#).unwrap();
    assert_eq!(event, StoreEvent::Custom);
    assert_eq!(event.session_id(), None);
}

#[test]
fn history_event_round_trips() {
    let event = StoreEvent::HistoryAppended {
        id: sid(),
        entry: HistoryEntry::Assistant { at_ms: 5, text: "hello".into() },
    };
    let json = serde_json::to_string(&event).unwrap();
    let back: StoreEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn usage_event_omits_absent_model() {
    let event = StoreEvent::UsageAdded {
        id: sid(),
        model: None,
        sample: Usage { input_tokens: 1, ..Default::default() },
        context_window: None,
        at_ms: 9,
    };
    let json = serde_json::to_value(&event).unwrap();
    assert!(json.get("model").is_none());
    assert!(json.get("context_window").is_none());
}

#[test]
fn session_id_reported_for_all_session_events() {
    let events = vec![
        StoreEvent::SessionRenamed { id: sid(), name: "n".into() },
        StoreEvent::WorkspaceBound { id: sid(), working_dir: PathBuf::from("/w") },
        StoreEvent::SessionDeleted { id: sid() },
        StoreEvent::AgentSessionIdSet { id: sid(), agent_session_id: "a1".into() },
        StoreEvent::ModelSet { id: sid(), model: "m".into() },
        StoreEvent::PermissionModeSet { id: sid(), mode: "plan".into() },
    ];
    for event in events {
        assert_eq!(event.session_id(), Some(sid()));
    }
}
