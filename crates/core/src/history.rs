// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session history entries.
//!
//! History is append-only: entries are never mutated once appended. A tool
//! result is stored as its own entry carrying the originating tool-use id so
//! renderers can merge the pair; the daemon never merges them itself.

use crate::question::{QuestionAnswer, QuestionEntry};
use serde::{Deserialize, Serialize};

/// An image attached to a user message: media type + opaque base64 payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub media_type: String,
    pub data: String,
}

/// One entry in a session's turn history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// A user message, with any image attachments.
    User {
        at_ms: u64,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<Attachment>,
    },

    /// Assistant text flushed at turn end.
    Assistant { at_ms: u64, text: String },

    /// Assistant thinking flushed at turn end.
    Thinking { at_ms: u64, text: String },

    /// Start of a tool invocation.
    ToolUse {
        at_ms: u64,
        tool_use_id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Result paired with a prior tool_use id. Kept standalone even when the
    /// id is unknown.
    ToolResult {
        at_ms: u64,
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },

    /// An AskUserQuestion prompt shown to the user.
    Question {
        at_ms: u64,
        request_id: String,
        questions: Vec<QuestionEntry>,
    },

    /// Question/answer pairs recorded once the user answered.
    AnsweredQuestion {
        at_ms: u64,
        answers: Vec<QuestionAnswer>,
    },

    /// A system notice (e.g. a model change).
    System { at_ms: u64, text: String },
}

impl HistoryEntry {
    pub fn at_ms(&self) -> u64 {
        match self {
            HistoryEntry::User { at_ms, .. }
            | HistoryEntry::Assistant { at_ms, .. }
            | HistoryEntry::Thinking { at_ms, .. }
            | HistoryEntry::ToolUse { at_ms, .. }
            | HistoryEntry::ToolResult { at_ms, .. }
            | HistoryEntry::Question { at_ms, .. }
            | HistoryEntry::AnsweredQuestion { at_ms, .. }
            | HistoryEntry::System { at_ms, .. } => *at_ms,
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
