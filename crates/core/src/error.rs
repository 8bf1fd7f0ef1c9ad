// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the daemon.
//!
//! Every user-visible failure maps onto one of these kinds; the gateway
//! serializes the kind tag plus a human-readable message into `error` frames.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Abstract error kind, used as the wire-level discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Busy,
    Workspace,
    Protocol,
    AgentExit,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Busy => "busy",
            ErrorKind::Workspace => "workspace",
            ErrorKind::Protocol => "protocol",
            ErrorKind::AgentExit => "agent_exit",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Recoverable errors reported to clients.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DockError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("busy: {0}")]
    Busy(String),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    AgentExit(String),

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DockError::NotFound(_) => ErrorKind::NotFound,
            DockError::Busy(_) => ErrorKind::Busy,
            DockError::Workspace(_) => ErrorKind::Workspace,
            DockError::Protocol(_) => ErrorKind::Protocol,
            DockError::AgentExit(_) => ErrorKind::AgentExit,
            DockError::Cancelled => ErrorKind::Cancelled,
            DockError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for an unknown-session error.
    pub fn unknown_session(id: impl std::fmt::Display) -> Self {
        DockError::NotFound(format!("unknown session: {id}"))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
