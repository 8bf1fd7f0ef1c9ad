// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn usage_interval_defaults_to_thirty_seconds() {
    // Unset in the test environment.
    if std::env::var("DOCK_USAGE_INTERVAL_MS").is_err() {
        assert_eq!(usage_interval(), Duration::from_secs(30));
    }
}

#[test]
fn agent_cmd_defaults_to_claude() {
    if std::env::var("DOCK_AGENT_CMD").is_err() {
        assert_eq!(agent_cmd(), "claude");
    }
}
