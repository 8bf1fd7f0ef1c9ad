// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn multi_select_uses_camel_case_on_the_wire() {
    let entry = QuestionEntry {
        question: "Which files?".into(),
        header: Some("Scope".into()),
        options: vec![QuestionOption { label: "all".into(), description: None }],
        multi_select: true,
    };
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["multiSelect"], true);
}

#[test]
fn minimal_question_deserializes_with_defaults() {
    let entry: QuestionEntry = serde_json::from_str(r#"{"question": "Proceed?"}"#).unwrap();
    assert_eq!(entry.question, "Proceed?");
    assert!(entry.header.is_none());
    assert!(entry.options.is_empty());
    assert!(!entry.multi_select);
}
