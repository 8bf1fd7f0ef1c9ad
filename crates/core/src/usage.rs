// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token usage accounting

use serde::{Deserialize, Serialize};

/// A token usage sample or accumulator.
///
/// Used both for incremental samples reported by the agent and for the
/// running totals kept per session and per model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

impl Usage {
    /// Accumulate another sample into this one.
    pub fn add(&mut self, sample: &Usage) {
        self.input_tokens += sample.input_tokens;
        self.output_tokens += sample.output_tokens;
        self.cache_creation_tokens += sample.cache_creation_tokens;
        self.cache_read_tokens += sample.cache_read_tokens;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total_tokens() == 0
    }
}

/// Per-model usage breakdown, with the context window size when the agent
/// reports one alongside a `result` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelUsage {
    #[serde(flatten)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u64>,
}

impl ModelUsage {
    /// Accumulate a sample; a reported context window always replaces the
    /// stored one (the agent may rotate models mid-session).
    pub fn add(&mut self, sample: &Usage, context_window: Option<u64>) {
        self.usage.add(sample);
        if context_window.is_some() {
            self.context_window = context_window;
        }
    }
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
