// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted fake agent for `--mock` mode.
//!
//! Speaks the same stream-JSON contract as the real agent CLI. The response
//! to each user message is chosen by directives embedded in its text:
//!
//! - `!thinking`: include a thinking block before the text
//! - `!tool`: emit a tool_use / tool_result pair
//! - `!question`: ask a question and wait for the answer frame
//! - `!die`: print partial text and exit 1 without a `result`
//! - anything else: echo the text back and finish the turn

use serde_json::{json, Value};
use std::io::{BufRead, Write};

const MOCK_MODEL: &str = "mock-1";

/// Blocking stdin/stdout loop. Returns the process exit code.
pub fn run() -> i32 {
    let stdin = std::io::stdin();
    let session_id = format!("mock-{}", std::process::id());
    let mut initialized = false;
    let mut turn: u64 = 0;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        let frame: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        match frame["type"].as_str() {
            Some("user") => {
                if !initialized {
                    emit(&json!({
                        "type": "system",
                        "subtype": "init",
                        "session_id": session_id,
                        "model": MOCK_MODEL,
                        "permissionMode": "ask",
                        "tools": ["Read", "Write", "Bash"],
                    }));
                    initialized = true;
                }
                turn += 1;
                let text = user_text(&frame);
                if let Some(code) = respond(&text, &session_id, turn) {
                    return code;
                }
            }
            Some("control_request") => {
                emit(&json!({
                    "type": "control_response",
                    "subtype": "success",
                    "request_id": frame["request_id"],
                    "response": frame["request"],
                }));
            }
            _ => {}
        }
    }
    0
}

/// Concatenated text parts of a user frame.
fn user_text(frame: &Value) -> String {
    let Some(content) = frame["message"]["content"].as_array() else {
        return String::new();
    };
    content
        .iter()
        .filter_map(|block| {
            if block["type"] == "text" {
                block["text"].as_str().map(str::to_owned)
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Play one turn. `Some(code)` means exit with that code immediately.
fn respond(text: &str, session_id: &str, turn: u64) -> Option<i32> {
    if text.contains("!die") {
        emit(&assistant_text("partial"));
        return Some(1);
    }

    if text.contains("!thinking") {
        emit(&json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": [
                {"type": "thinking", "thinking": "considering the request"},
            ]},
        }));
    }

    if text.contains("!tool") {
        let tool_use_id = format!("mock-tu-{turn}");
        emit(&json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": [
                {"type": "tool_use", "id": tool_use_id.clone(), "name": "Read", "input": {"path": "/tmp/file"}},
            ]},
        }));
        emit(&json!({
            "type": "user",
            "message": {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": tool_use_id, "content": "file contents", "is_error": false},
            ]},
        }));
    }

    if text.contains("!question") {
        emit(&json!({
            "type": "assistant",
            "message": {"role": "assistant", "content": [
                {"type": "tool_use", "id": format!("mock-q-{turn}"), "name": "AskUserQuestion",
                 "input": {"questions": [{"question": "Proceed with the plan?", "header": "Plan",
                           "options": [{"label": "yes"}, {"label": "no"}], "multiSelect": false}]}},
            ]},
        }));
        // The answer arrives as the next user frame; the outer loop starts a
        // new turn for it, which is indistinguishable from a fresh prompt for
        // the mock's purposes.
        return None;
    }

    emit(&assistant_text(&format!("echo: {text}")));
    emit(&json!({
        "type": "result",
        "result": format!("echo: {text}"),
        "session_id": session_id,
        "usage": {"input_tokens": 10, "output_tokens": 5},
        "modelUsage": {"mock-1": {"inputTokens": 10, "outputTokens": 5, "contextWindow": 200000}},
    }));
    None
}

fn assistant_text(text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {"role": "assistant", "content": [{"type": "text", "text": text}]},
    })
}

fn emit(value: &Value) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{value}");
    let _ = stdout.flush();
}

#[cfg(test)]
#[path = "mock_tests.rs"]
mod tests;
