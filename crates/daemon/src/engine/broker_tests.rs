// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn sid(s: &str) -> SessionId {
    SessionId::from(s)
}

#[test]
fn register_take_round_trip() {
    let broker = Broker::new();
    assert!(broker.register("r1", sid("ses-a"), 7));
    let waiter = broker.take("r1", sid("ses-a")).unwrap();
    assert_eq!(waiter, PermissionWaiter { session_id: sid("ses-a"), conn: 7 });
    assert_eq!(broker.outstanding(), 0);
}

#[test]
fn duplicate_request_ids_are_rejected() {
    let broker = Broker::new();
    assert!(broker.register("r1", sid("ses-a"), 7));
    assert!(!broker.register("r1", sid("ses-a"), 8));
}

#[test]
fn take_is_single_shot() {
    let broker = Broker::new();
    broker.register("r1", sid("ses-a"), 7);
    assert!(broker.take("r1", sid("ses-a")).is_some());
    // A second response for the same id finds nothing.
    assert!(broker.take("r1", sid("ses-a")).is_none());
}

#[test]
fn session_mismatch_leaves_waiter_untouched() {
    let broker = Broker::new();
    broker.register("r1", sid("ses-a"), 7);
    assert!(broker.take("r1", sid("ses-b")).is_none());
    assert_eq!(broker.outstanding(), 1);
    assert!(broker.take("r1", sid("ses-a")).is_some());
}

#[test]
fn cancel_conn_removes_only_that_conns_waiters() {
    let broker = Broker::new();
    broker.register("r1", sid("ses-a"), 7);
    broker.register("r2", sid("ses-b"), 7);
    broker.register("r3", sid("ses-c"), 9);

    let mut cancelled = broker.cancel_conn(7);
    cancelled.sort();
    assert_eq!(cancelled, vec![("r1".to_string(), sid("ses-a")), ("r2".to_string(), sid("ses-b"))]);
    assert_eq!(broker.outstanding(), 1);
}

#[test]
fn cancel_session_reports_waiting_conns() {
    let broker = Broker::new();
    broker.register("r1", sid("ses-a"), 7);
    broker.register("r2", sid("ses-a"), 8);
    broker.register("r3", sid("ses-b"), 9);

    let mut cancelled = broker.cancel_session(sid("ses-a"));
    cancelled.sort();
    assert_eq!(cancelled, vec![("r1".to_string(), 7), ("r2".to_string(), 8)]);
    assert_eq!(broker.outstanding(), 1);
}
