// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent child process management.
//!
//! One agent child per running session. The codec turns the child's
//! newline-delimited JSON stdout into typed [`AgentEvent`]s; the process
//! module spawns and supervises the child and owns its stdin.

pub mod codec;
pub mod mock;
pub mod process;

pub use codec::{AgentEvent, LineAssembler, OutboundFrame, MAX_LINE_LEN};
pub use process::{AgentChild, AgentLauncher, ProcessLauncher, SpawnSpec};
