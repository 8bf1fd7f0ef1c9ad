// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream-JSON codec for the agent child.
//!
//! Stdout is an infinite sequence of newline-terminated JSON objects,
//! possibly split across reads; the assembler buffers incomplete tails and
//! yields complete lines. An `assistant` envelope fans out into one typed
//! event per content block, in block order. Malformed lines are skipped by
//! the caller; they never terminate the stream.

use dock_core::{Attachment, DockError, ModelUsage, Usage};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Maximum accepted line length. Longer lines raise a `protocol` error and
/// are discarded through the next newline.
pub const MAX_LINE_LEN: usize = 1024 * 1024;

/// Typed events decoded from the agent's stdout (plus the synthetic `Exit`
/// appended by the supervisor when the child is reaped).
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    AssistantText {
        text: String,
    },
    AssistantThinking {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        is_error: bool,
    },
    /// Turn terminator.
    Result {
        text: String,
        agent_session_id: Option<String>,
        usage: Option<Usage>,
        model_usage: BTreeMap<String, ModelUsage>,
    },
    System {
        subtype: String,
        agent_session_id: Option<String>,
        model: Option<String>,
        permission_mode: Option<String>,
        cwd: Option<String>,
        tools: Vec<String>,
    },
    Usage {
        sample: Usage,
    },
    ControlResponse {
        success: bool,
        request_id: String,
        response: Option<Value>,
        error: Option<String>,
    },
    /// Synthesized by the supervisor after the child is reaped.
    Exit {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

/// Buffers raw stdout chunks and yields complete newline-terminated lines.
#[derive(Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
    /// Set while discarding an oversized line up to its next newline.
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns each completed line, or a `protocol` error for
    /// a line that exceeded [`MAX_LINE_LEN`].
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String, DockError>> {
        let mut out = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                if self.overflowed {
                    self.overflowed = false;
                } else {
                    let line = String::from_utf8_lossy(&self.buf).into_owned();
                    if !line.trim().is_empty() {
                        out.push(Ok(line));
                    }
                }
                self.buf.clear();
                continue;
            }
            if self.overflowed {
                continue;
            }
            if self.buf.len() >= MAX_LINE_LEN {
                self.overflowed = true;
                self.buf.clear();
                out.push(Err(DockError::Protocol(format!(
                    "agent output line exceeds {} bytes",
                    MAX_LINE_LEN
                ))));
                continue;
            }
            self.buf.push(byte);
        }
        out
    }
}

// ---- Inbound wire shapes ----

/// Token usage as the agent reports it (snake_case CLI keys, with the short
/// aliases some frames use).
#[derive(Debug, Default, Deserialize)]
struct WireUsage {
    #[serde(default, alias = "input")]
    input_tokens: u64,
    #[serde(default, alias = "output")]
    output_tokens: u64,
    #[serde(default, alias = "cache_creation", alias = "cache_creation_input_tokens")]
    cache_creation_tokens: u64,
    #[serde(default, alias = "cache_read", alias = "cache_read_input_tokens")]
    cache_read_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(w: WireUsage) -> Self {
        Usage {
            input_tokens: w.input_tokens,
            output_tokens: w.output_tokens,
            cache_creation_tokens: w.cache_creation_tokens,
            cache_read_tokens: w.cache_read_tokens,
        }
    }
}

/// Per-model usage inside a `result` frame (camelCase CLI keys).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireModelUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: u64,
    #[serde(default)]
    cache_read_input_tokens: u64,
    #[serde(default)]
    context_window: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Assistant {
        message: WireMessage,
    },
    User {
        message: WireMessage,
    },
    Result {
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        usage: Option<WireUsage>,
        #[serde(default, rename = "modelUsage")]
        model_usage: BTreeMap<String, WireModelUsage>,
    },
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default, alias = "permissionMode")]
        permission_mode: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        tools: Vec<String>,
    },
    Usage(WireUsage),
    ControlResponse {
        subtype: String,
        request_id: String,
        #[serde(default)]
        response: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Vec<WireContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContent {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// Decode one complete line into typed events.
///
/// Assistant/user envelopes yield one event per recognized content block;
/// everything else maps one-to-one.
pub fn decode_line(line: &str) -> Result<Vec<AgentEvent>, DockError> {
    let wire: WireEvent = serde_json::from_str(line)
        .map_err(|e| DockError::Protocol(format!("malformed agent event: {e}")))?;

    let events = match wire {
        WireEvent::Assistant { message } | WireEvent::User { message } => message
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireContent::Text { text } => Some(AgentEvent::AssistantText { text }),
                WireContent::Thinking { thinking } => {
                    Some(AgentEvent::AssistantThinking { text: thinking })
                }
                WireContent::ToolUse { id, name, input } => {
                    Some(AgentEvent::ToolUse { id, name, input })
                }
                WireContent::ToolResult { tool_use_id, content, is_error } => {
                    Some(AgentEvent::ToolResult { tool_use_id, content, is_error })
                }
                WireContent::Other => None,
            })
            .collect(),
        WireEvent::Result { result, session_id, usage, model_usage } => {
            vec![AgentEvent::Result {
                text: result.unwrap_or_default(),
                agent_session_id: session_id,
                usage: usage.map(Usage::from),
                model_usage: model_usage
                    .into_iter()
                    .map(|(model, w)| {
                        (
                            model,
                            ModelUsage {
                                usage: Usage {
                                    input_tokens: w.input_tokens,
                                    output_tokens: w.output_tokens,
                                    cache_creation_tokens: w.cache_creation_input_tokens,
                                    cache_read_tokens: w.cache_read_input_tokens,
                                },
                                context_window: w.context_window,
                            },
                        )
                    })
                    .collect(),
            }]
        }
        WireEvent::System { subtype, session_id, model, permission_mode, cwd, tools } => {
            vec![AgentEvent::System {
                subtype: subtype.unwrap_or_default(),
                agent_session_id: session_id,
                model,
                permission_mode,
                cwd,
                tools,
            }]
        }
        WireEvent::Usage(sample) => vec![AgentEvent::Usage { sample: sample.into() }],
        WireEvent::ControlResponse { subtype, request_id, response, error } => {
            vec![AgentEvent::ControlResponse {
                success: subtype == "success",
                request_id,
                response,
                error,
            }]
        }
    };
    Ok(events)
}

// ---- Outbound frames ----

/// Frames written to the child's stdin. Each serializes to exactly one line
/// with a trailing newline; the writer guarantees the write is atomic.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// A user message, with any image parts ahead of the text.
    User { text: String, images: Vec<Attachment> },
    /// A control request (e.g. a permission-mode change).
    SetPermissionMode { request_id: String, mode: String },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireOutbound<'a> {
    User {
        message: WireOutboundMessage<'a>,
    },
    ControlRequest {
        request_id: &'a str,
        request: WireControlRequest<'a>,
    },
}

#[derive(Serialize)]
struct WireOutboundMessage<'a> {
    role: &'static str,
    content: Vec<WireOutboundContent<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireOutboundContent<'a> {
    Text { text: &'a str },
    Image { source: WireImageSource<'a> },
}

#[derive(Serialize)]
struct WireImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
enum WireControlRequest<'a> {
    SetPermissionMode { mode: &'a str },
}

impl OutboundFrame {
    /// Serialize as a single line including the trailing newline.
    pub fn to_line(&self) -> Result<String, DockError> {
        let wire = match self {
            OutboundFrame::User { text, images } => {
                let mut content: Vec<WireOutboundContent<'_>> = images
                    .iter()
                    .map(|img| WireOutboundContent::Image {
                        source: WireImageSource {
                            kind: "base64",
                            media_type: &img.media_type,
                            data: &img.data,
                        },
                    })
                    .collect();
                content.push(WireOutboundContent::Text { text });
                WireOutbound::User {
                    message: WireOutboundMessage { role: "user", content },
                }
            }
            OutboundFrame::SetPermissionMode { request_id, mode } => WireOutbound::ControlRequest {
                request_id,
                request: WireControlRequest::SetPermissionMode { mode },
            },
        };
        let mut line = serde_json::to_string(&wire)
            .map_err(|e| DockError::Internal(format!("frame serialization failed: {e}")))?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
